//! Workspace package discovery and the internal dependency graph.

use anyhow::{Context, Result};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ReleaseError;
use crate::git::ChangeDetector;
use crate::manifest::PackageManifest;
use crate::workspace::WorkspaceScanner;

/// One publishable package of the workspace.
#[derive(Debug, Clone)]
pub struct Package {
    pub path: PathBuf,
    pub manifest: PackageManifest,
    pub has_changed_since_last_release: bool,
    /// Names of other workspace packages listed in `dependencies` or
    /// `peerDependencies`. Never contains the package itself.
    pub internal_dependencies: BTreeSet<String>,
}

impl Package {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &Version {
        &self.manifest.version
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest.path
    }
}

/// Publishable packages keyed by name.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    packages: BTreeMap<String, Package>,
}

impl PackageGraph {
    /// Build the graph from loaded manifests and their change status.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (PackageManifest, bool)>,
    ) -> Result<Self, ReleaseError> {
        let mut packages: BTreeMap<String, Package> = BTreeMap::new();

        for (manifest, changed) in entries {
            if let Some(existing) = packages.get(&manifest.name) {
                return Err(ReleaseError::DuplicatePackage {
                    name: manifest.name.clone(),
                    first: existing.manifest.path.clone(),
                    second: manifest.path.clone(),
                });
            }

            let path = manifest
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            packages.insert(
                manifest.name.clone(),
                Package {
                    path,
                    manifest,
                    has_changed_since_last_release: changed,
                    internal_dependencies: BTreeSet::new(),
                },
            );
        }

        let names: Vec<String> = packages.keys().cloned().collect();
        for package in packages.values_mut() {
            package.internal_dependencies = names
                .iter()
                .filter(|other| **other != package.manifest.name)
                .filter(|other| package.manifest.depends_on(other))
                .cloned()
                .collect();
        }

        Ok(Self { packages })
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Package> {
        self.packages.get_mut(name)
    }

    /// Packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Package> {
        self.packages.values_mut()
    }

    pub fn any_changed(&self) -> bool {
        self.iter().any(|p| p.has_changed_since_last_release)
    }

    /// Packages that list `name` as an internal dependency.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.iter()
            .filter(|p| p.internal_dependencies.contains(name))
            .map(Package::name)
            .collect()
    }

    /// Internal dependencies and dependents of `name`, in name order.
    pub fn neighbours(&self, name: &str) -> BTreeSet<String> {
        let mut neighbours: BTreeSet<String> = self
            .get(name)
            .map(|p| p.internal_dependencies.clone())
            .unwrap_or_default();
        neighbours.extend(self.dependents_of(name).into_iter().map(str::to_string));
        neighbours
    }
}

/// Scan `<workspace_root>/<packages_dir>` and build the package graph.
///
/// The last release tag is resolved first; a repository without one cannot
/// be released and the error propagates. Per-package change checks run on
/// the blocking pool concurrently.
pub async fn discover(
    workspace_root: &Path,
    packages_dir: &str,
    detector: Arc<dyn ChangeDetector>,
) -> Result<PackageGraph> {
    let marker = {
        let detector = Arc::clone(&detector);
        tokio::task::spawn_blocking(move || detector.last_release_marker())
            .await
            .context("Release tag lookup panicked")??
    };

    let scanner = WorkspaceScanner::new(workspace_root.join(packages_dir));
    let manifests = scanner
        .find_publishable_packages()
        .context("Failed to find packages")?;

    let mut handles = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let detector = Arc::clone(&detector);
        let marker = marker.clone();

        handles.push(tokio::task::spawn_blocking(move || {
            let dir = manifest
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let changed = detector
                .has_changed(&marker, &dir.join("src"), &manifest.path)
                .with_context(|| format!("Failed to check {} for changes", manifest.name))?;
            Ok::<_, anyhow::Error>((manifest, changed))
        }));
    }

    let mut entries = Vec::with_capacity(handles.len());
    for handle in handles {
        entries.push(handle.await.context("Change detection task panicked")??);
    }

    let graph = PackageGraph::from_entries(entries)?;
    tracing::debug!(
        packages = graph.len(),
        changed = graph.iter().filter(|p| p.has_changed_since_last_release).count(),
        tag = %marker,
        "discovered workspace packages"
    );
    Ok(graph)
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
