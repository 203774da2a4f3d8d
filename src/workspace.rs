//! Workspace scanning and package discovery.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::manifest::PackageManifest;

pub const MANIFEST_FILE: &str = "package.json";

/// Scans a packages directory for package.json files.
#[derive(Debug)]
pub struct WorkspaceScanner {
    root: PathBuf,
}

impl WorkspaceScanner {
    /// Create a new workspace scanner rooted at the packages directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find all package.json paths, excluding node_modules/ and build directories.
    ///
    /// Results are sorted so discovery order never depends on the filesystem.
    pub fn find_manifest_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        if !self.root.is_dir() {
            tracing::debug!(root = %self.root.display(), "packages directory does not exist");
            return Ok(paths);
        }

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !matches!(name.as_ref(), "node_modules" | ".git" | "target" | "dist")
            })
        {
            let entry = entry.context("Failed to read directory entry")?;

            if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE {
                paths.push(entry.into_path());
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Load only the manifests intended for public distribution.
    ///
    /// Private or unconfigured packages are skipped before their name and
    /// version are checked.
    pub fn find_publishable_packages(&self) -> Result<Vec<PackageManifest>> {
        let paths = self.find_manifest_paths()?;
        let total = paths.len();

        let mut packages = Vec::new();
        for path in paths {
            match PackageManifest::load_publishable(&path)? {
                Some(manifest) => packages.push(manifest),
                None => tracing::debug!(path = %path.display(), "skipping non-public package"),
            }
        }

        tracing::debug!(
            total,
            publishable = packages.len(),
            root = %self.root.display(),
            "scanned workspace"
        );
        Ok(packages)
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
