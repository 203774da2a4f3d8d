//! Release settings from `release.toml` and their defaults.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use toml_edit::{DocumentMut, Item};

pub const CONFIG_FILE: &str = "release.toml";

/// Settings for one release run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOptions {
    /// conventional-changelog preset.
    pub preset: String,
    /// npm dist-tag passed to publish.
    pub dist_tag: Option<String>,
    /// Branch releases must be cut from. `None` skips the branch checks.
    pub expected_branch: Option<String>,
    pub dry_run: bool,
    /// Directory under the workspace root holding the packages.
    pub packages_dir: String,
    pub remote: String,
    pub package_manager: String,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            preset: "angular".to_string(),
            dist_tag: None,
            expected_branch: None,
            dry_run: false,
            packages_dir: "packages".to_string(),
            remote: "origin".to_string(),
            package_manager: "pnpm".to_string(),
        }
    }
}

impl ReleaseOptions {
    /// Load `release.toml` from `root`, falling back to defaults when absent.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no release config, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse the contents of a `release.toml`.
    pub fn parse(content: &str) -> Result<Self> {
        let document: DocumentMut = content.parse().context("Failed to parse TOML")?;
        let mut options = Self::default();

        for (key, item) in document.iter() {
            match key {
                "preset" => options.preset = string(key, item)?,
                "dist_tag" => options.dist_tag = Some(string(key, item)?),
                "branch" => options.expected_branch = Some(string(key, item)?),
                "dry_run" => {
                    options.dry_run = item
                        .as_bool()
                        .ok_or_else(|| anyhow!("'{}' must be a boolean", key))?
                }
                "packages_dir" => options.packages_dir = string(key, item)?,
                "remote" => options.remote = string(key, item)?,
                "package_manager" => options.package_manager = string(key, item)?,
                other => tracing::warn!(key = other, "ignoring unknown release config key"),
            }
        }

        Ok(options)
    }
}

fn string(key: &str, item: &Item) -> Result<String> {
    item.as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("'{}' must be a string", key))
}
