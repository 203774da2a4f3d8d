//! Release classification and version propagation across the package graph.

use anyhow::{Context, Result};
use semver::Version;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;

use crate::error::ReleaseError;
use crate::graph::PackageGraph;
use crate::manifest::{DependencySection, PackageManifest};
use crate::version::{diff, ReleaseType};

/// Whether every package is bumped or only the changed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Partial,
    Full,
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial => f.write_str("partial"),
            Self::Full => f.write_str("full"),
        }
    }
}

/// Decide the release kind from the root version change.
///
/// On 0.x only patch-level changes are partial; from 1.0 on minor changes
/// are partial as well.
pub fn classify(old: &Version, new: &Version) -> ReleaseKind {
    let Some(kind) = diff(old, new) else {
        return ReleaseKind::Full;
    };

    let partial = if new.major == 0 {
        matches!(
            kind,
            ReleaseType::Patch | ReleaseType::Prepatch | ReleaseType::Prerelease
        )
    } else {
        matches!(
            kind,
            ReleaseType::Minor
                | ReleaseType::Preminor
                | ReleaseType::Patch
                | ReleaseType::Prepatch
                | ReleaseType::Prerelease
        )
    };

    if partial {
        ReleaseKind::Partial
    } else {
        ReleaseKind::Full
    }
}

/// One in-memory change to a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    Version {
        package: String,
        from: String,
        to: String,
    },
    DependencyRange {
        package: String,
        section: DependencySection,
        dependency: String,
        from: String,
        to: String,
    },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version { package, to, .. } => write!(f, "{} => {}", package, to),
            Self::DependencyRange {
                package,
                section,
                dependency,
                to,
                ..
            } => write!(f, "{} -> {} -> {}@{}", package, section.key(), dependency, to),
        }
    }
}

/// Everything propagation decided, for display and audit.
#[derive(Debug, Clone, Serialize)]
pub struct PropagationReport {
    pub kind: ReleaseKind,
    pub from: String,
    pub to: String,
    pub mutations: Vec<Mutation>,
}

impl PropagationReport {
    pub fn bumped_packages(&self) -> Vec<&str> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::Version { package, .. } => Some(package.as_str()),
                Mutation::DependencyRange { .. } => None,
            })
            .collect()
    }
}

/// Assign `new` across the graph and rewrite internal dependency ranges.
///
/// Pure over `graph`: nothing is written to disk. A partial release with no
/// changed package fails with [`ReleaseError::NoChanges`] before any mutation.
pub fn propagate(
    graph: &mut PackageGraph,
    old: &Version,
    new: &Version,
) -> Result<PropagationReport, ReleaseError> {
    let kind = classify(old, new);
    tracing::debug!(%old, %new, %kind, "classified release");

    let mut mutations = match kind {
        ReleaseKind::Full => assign_all(graph, new),
        ReleaseKind::Partial => assign_changed(graph, new)?,
    };
    mutations.extend(rewrite_dependency_ranges(graph));

    Ok(PropagationReport {
        kind,
        from: old.to_string(),
        to: new.to_string(),
        mutations,
    })
}

/// Full release: every package moves to `new`.
pub fn assign_all(graph: &mut PackageGraph, new: &Version) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    for package in graph.iter_mut() {
        let from = package.version().clone();
        package.manifest.set_version(new);
        if &from != new {
            mutations.push(version_mutation(package.name(), &from, new));
        }
    }
    mutations
}

/// Partial release: changed packages move to `new`, and so does every
/// package connected to them through internal dependency edges.
pub fn assign_changed(
    graph: &mut PackageGraph,
    new: &Version,
) -> Result<Vec<Mutation>, ReleaseError> {
    if !graph.any_changed() {
        return Err(ReleaseError::NoChanges);
    }

    let seeds: Vec<String> = graph
        .iter()
        .filter(|p| p.has_changed_since_last_release && p.version() != new)
        .map(|p| p.name().to_string())
        .collect();

    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut queue: VecDeque<String> = seeds.into();
    let mut mutations = Vec::new();

    while let Some(name) = queue.pop_front() {
        let Some(package) = graph.get_mut(&name) else {
            continue;
        };
        let from = package.version().clone();
        package.manifest.set_version(new);
        mutations.push(version_mutation(&name, &from, new));

        for neighbour in graph.neighbours(&name) {
            let at_target = graph.get(&neighbour).is_some_and(|p| p.version() == new);
            if !at_target && visited.insert(neighbour.clone()) {
                queue.push_back(neighbour);
            }
        }
    }

    Ok(mutations)
}

/// Point every internal `dependencies`/`peerDependencies` entry at `^<version>`.
///
/// Entries naming packages outside the graph are left alone. Running it on a
/// consistent graph yields no mutations.
pub fn rewrite_dependency_ranges(graph: &mut PackageGraph) -> Vec<Mutation> {
    let versions: BTreeMap<String, Version> = graph
        .iter()
        .map(|p| (p.name().to_string(), p.version().clone()))
        .collect();

    let mut mutations = Vec::new();
    for package in graph.iter_mut() {
        for section in DependencySection::ALL {
            let internal: Vec<String> = package
                .manifest
                .dependency_names(section)
                .into_iter()
                .filter(|name| versions.contains_key(*name))
                .map(str::to_string)
                .collect();

            for dependency in internal {
                let range = format!("^{}", versions[&dependency]);
                if let Some(from) = package
                    .manifest
                    .set_dependency_range(section, &dependency, &range)
                {
                    let mutation = Mutation::DependencyRange {
                        package: package.name().to_string(),
                        section,
                        dependency,
                        from,
                        to: range,
                    };
                    tracing::debug!(%mutation, "dependency range updated");
                    mutations.push(mutation);
                }
            }
        }
    }
    mutations
}

fn version_mutation(package: &str, from: &Version, to: &Version) -> Mutation {
    let mutation = Mutation::Version {
        package: package.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    };
    tracing::debug!(%mutation, "version updated");
    mutation
}

/// Write every package manifest plus `extra` (the root manifest) in one batch.
///
/// All documents are serialized before the first write so a serialization
/// failure leaves the workspace untouched.
pub fn persist(graph: &PackageGraph, extra: &[&PackageManifest]) -> Result<usize> {
    let rendered: Vec<(&Path, String)> = graph
        .iter()
        .map(|p| &p.manifest)
        .chain(extra.iter().copied())
        .map(|manifest| {
            manifest
                .render()
                .map(|content| (manifest.path.as_path(), content))
                .with_context(|| format!("Failed to serialize {}", manifest.path.display()))
        })
        .collect::<Result<_>>()?;

    for (path, content) in &rendered {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    tracing::debug!(files = rendered.len(), "manifests written");
    Ok(rendered.len())
}

#[cfg(test)]
#[path = "propagate_tests.rs"]
mod tests;
