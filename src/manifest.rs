//! package.json parsing and manipulation utilities.

use semver::Version;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::ManifestError;

/// Dependency sections that can reference other workspace packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum DependencySection {
    #[serde(rename = "dependencies")]
    Dependencies,
    #[serde(rename = "peerDependencies")]
    PeerDependencies,
}

impl DependencySection {
    pub const ALL: [DependencySection; 2] = [Self::Dependencies, Self::PeerDependencies];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::PeerDependencies => "peerDependencies",
        }
    }
}

/// Represents a package.json manifest file.
///
/// The raw document keeps its key order so a rewrite only touches the
/// fields that were changed.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub path: PathBuf,
    pub name: String,
    pub version: Version,
    document: Map<String, Value>,
}

impl PackageManifest {
    /// Load a package.json file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        Self::from_document(path, read_document(path)?)
    }

    /// Load a package manifest only when it is publishable.
    ///
    /// Excluded manifests are not validated beyond being JSON objects, so a
    /// private playground without a version does not stop discovery.
    pub fn load_publishable(path: impl AsRef<Path>) -> Result<Option<Self>, ManifestError> {
        let path = path.as_ref();
        let document = read_document(path)?;
        if !document_is_publishable(&document) {
            return Ok(None);
        }
        Self::from_document(path, document).map(Some)
    }

    /// Load the workspace root manifest, where only `version` is required.
    ///
    /// A root without `name` is reported under its directory name.
    pub fn load_root(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let document = read_document(path)?;

        let name = match document.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let version = required_version(path, &document)?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            version,
            document,
        })
    }

    /// Parse manifest content that was read from `path`.
    pub fn parse(path: impl AsRef<Path>, content: &str) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        Self::from_document(path, parse_document(path, content)?)
    }

    fn from_document(path: &Path, document: Map<String, Value>) -> Result<Self, ManifestError> {
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ManifestError::MissingField {
                path: path.to_path_buf(),
                field: "name",
            })?
            .to_string();
        let version = required_version(path, &document)?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            version,
            document,
        })
    }

    /// Whether the package is meant for public distribution:
    /// not `private` and explicitly `publishConfig.access = "public"`.
    pub fn is_publishable(&self) -> bool {
        document_is_publishable(&self.document)
    }

    /// Names declared in a dependency section, in document order.
    pub fn dependency_names(&self, section: DependencySection) -> Vec<&str> {
        match self.document.get(section.key()) {
            Some(Value::Object(deps)) => deps.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `name` appears in `dependencies` or `peerDependencies`.
    pub fn depends_on(&self, name: &str) -> bool {
        DependencySection::ALL.iter().any(|section| {
            self.document
                .get(section.key())
                .and_then(Value::as_object)
                .is_some_and(|deps| deps.contains_key(name))
        })
    }

    /// The version range declared for `name` in `section`.
    pub fn dependency_range(&self, section: DependencySection, name: &str) -> Option<&str> {
        self.document
            .get(section.key())
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    /// Update the package version.
    pub fn set_version(&mut self, new_version: &Version) {
        self.version = new_version.clone();
        self.document
            .insert("version".to_string(), Value::String(new_version.to_string()));
    }

    /// Replace the range of an existing dependency entry.
    ///
    /// Returns the previous range when the entry existed and changed.
    pub fn set_dependency_range(
        &mut self,
        section: DependencySection,
        name: &str,
        range: &str,
    ) -> Option<String> {
        let entry = self
            .document
            .get_mut(section.key())
            .and_then(Value::as_object_mut)
            .and_then(|deps| deps.get_mut(name))?;

        let previous = entry.as_str().map(str::to_string);
        if previous.as_deref() == Some(range) {
            return None;
        }

        *entry = Value::String(range.to_string());
        Some(previous.unwrap_or_default())
    }

    /// Render the manifest as 2-space indented JSON with a trailing newline.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        let mut content = serde_json::to_string_pretty(&self.document)?;
        content.push('\n');
        Ok(content)
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &content)
}

fn parse_document(path: &Path, content: &str) -> Result<Map<String, Value>, ManifestError> {
    serde_json::from_str(content).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn required_version(path: &Path, document: &Map<String, Value>) -> Result<Version, ManifestError> {
    let version_str = document
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| ManifestError::MissingField {
            path: path.to_path_buf(),
            field: "version",
        })?;

    Version::parse(version_str).map_err(|source| ManifestError::InvalidVersion {
        path: path.to_path_buf(),
        version: version_str.to_string(),
        source,
    })
}

fn document_is_publishable(document: &Map<String, Value>) -> bool {
    let private = document
        .get("private")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let access = document
        .get("publishConfig")
        .and_then(|c| c.get("access"))
        .and_then(Value::as_str);

    !private && access == Some("public")
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
