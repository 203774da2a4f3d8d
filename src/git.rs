//! Git queries used to gate and scope a release.

use anyhow::{Context, Result};
use git2::{DescribeFormatOptions, DescribeOptions, DiffOptions, ErrorCode, StatusOptions};
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ReleaseError;

/// Answers "what changed since the last release".
///
/// Implementations must be shareable across threads: discovery asks about
/// every package concurrently.
pub trait ChangeDetector: Send + Sync {
    /// Name of the most recent release tag reachable from HEAD.
    fn last_release_marker(&self) -> Result<String>;

    /// Whether anything under `source_dir` or `manifest_path` differs from `marker`.
    fn has_changed(&self, marker: &str, source_dir: &Path, manifest_path: &Path) -> Result<bool>;
}

/// Repository state checks performed before a release.
pub trait Vcs: ChangeDetector {
    fn is_dirty(&self) -> Result<bool>;

    /// Current branch name; empty on a detached HEAD.
    fn current_branch(&self) -> Result<String>;

    /// Human-readable tracking report for `remote` (`git remote show`).
    fn remote_status(&self, remote: &str) -> Result<String>;
}

/// Whether a `git remote show` report says `branch` is behind its remote.
pub fn branch_is_stale(remote_report: &str, branch: &str) -> Result<bool> {
    let pattern = format!(
        r"\W{}\W.*(?:fast-forwardable|local out of date)",
        regex::escape(branch)
    );
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .context("Failed to build branch staleness pattern")?;
    Ok(re.is_match(remote_report))
}

/// `Vcs` backed by libgit2, with the `git` binary for remote queries.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<git2::Repository> {
        git2::Repository::discover(&self.root).with_context(|| {
            format!("Failed to open git repository at {}", self.root.display())
        })
    }

    /// Path of `path` relative to the repository work tree, as a pathspec.
    fn pathspec(workdir: &Path, path: &Path) -> String {
        let absolute = path.canonicalize().unwrap_or_else(|_| {
            // Paths that do not exist yet (a package without src/) still
            // resolve through their parent directory.
            match (path.parent(), path.file_name()) {
                (Some(parent), Some(name)) => parent
                    .canonicalize()
                    .map(|p| p.join(name))
                    .unwrap_or_else(|_| path.to_path_buf()),
                _ => path.to_path_buf(),
            }
        });
        let relative = absolute.strip_prefix(workdir).unwrap_or(&absolute);
        relative.to_string_lossy().replace('\\', "/")
    }
}

impl ChangeDetector for GitRepository {
    fn last_release_marker(&self) -> Result<String> {
        let repo = self.open()?;
        let describe = repo
            .describe(DescribeOptions::new().describe_tags())
            .map_err(ReleaseError::MissingReleaseMarker)?;
        let mut format = DescribeFormatOptions::new();
        format.abbreviated_size(0);
        let tag = describe.format(Some(&format))?;

        tracing::debug!(%tag, "last release tag");
        Ok(tag)
    }

    fn has_changed(&self, marker: &str, source_dir: &Path, manifest_path: &Path) -> Result<bool> {
        let repo = self.open()?;
        let workdir = repo
            .workdir()
            .context("Bare repositories cannot be released")?
            .canonicalize()
            .context("Failed to resolve repository work tree")?;

        let tree = repo
            .revparse_single(marker)
            .and_then(|object| object.peel_to_tree())
            .with_context(|| format!("Failed to resolve release tag {}", marker))?;

        let mut options = DiffOptions::new();
        for path in [source_dir, manifest_path] {
            options.pathspec(Self::pathspec(&workdir, path));
        }

        let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut options))?;
        let changed = diff.deltas().len() > 0;

        tracing::debug!(
            source = %source_dir.display(),
            changed,
            "compared package against {}",
            marker
        );
        Ok(changed)
    }
}

impl Vcs for GitRepository {
    fn is_dirty(&self) -> Result<bool> {
        let repo = self.open()?;
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = repo.statuses(Some(&mut options))?;
        for entry in statuses.iter() {
            tracing::debug!(path = entry.path().unwrap_or("?"), "uncommitted change");
        }
        Ok(!statuses.is_empty())
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.open()?;

        let branch = match repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().unwrap_or_default().to_string(),
            Ok(_) => String::new(),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                // No commits yet; HEAD still names the branch.
                let head = repo.find_reference("HEAD")?;
                head.symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .unwrap_or_default()
                    .to_string()
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to get HEAD")),
        };

        Ok(branch)
    }

    fn remote_status(&self, remote: &str) -> Result<String> {
        let output = Command::new("git")
            .args(["remote", "show", remote])
            .current_dir(&self.root)
            .output()
            .context("Failed to run git remote show")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git remote show {} failed:\n{}", remote, stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
