//! Error taxonomy and release outcomes.

use semver::Version;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Rejection of an operator-supplied version string.
///
/// Recoverable: the prompt shows the message and asks again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Version is required")]
    Empty,
    #[error("Invalid version")]
    Invalid(String),
}

/// Problems reading or interpreting a `package.json`.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Missing {field} in {}", path.display())]
    MissingField { path: PathBuf, field: &'static str },
    #[error("Invalid version '{version}' in {}", path.display())]
    InvalidVersion {
        path: PathBuf,
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// Fatal conditions raised by the release core.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("No package has changed since last release.")]
    NoChanges,
    #[error("No release tag found; tag the previous release before running a partial release")]
    MissingReleaseMarker(#[source] git2::Error),
    #[error("Package name '{name}' is declared by both {} and {}", first.display(), second.display())]
    DuplicatePackage {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: String },
}

/// Why a run stopped before completing without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    DirtyWorkingTree,
    WrongBranch { expected: String, actual: String },
    StaleBranch { branch: String },
    NoChanges,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirtyWorkingTree => write!(f, "Git repo isn't clean."),
            Self::WrongBranch { expected, actual } => write!(
                f,
                "You should be on branch \"{}\" but are on \"{}\"",
                expected, actual
            ),
            Self::StaleBranch { branch } => {
                write!(f, "Git branch {} is not in sync with remote", branch)
            }
            Self::NoChanges => write!(f, "No package has changed since last release."),
        }
    }
}

/// Operator declined a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    VersionDeclined,
    ChangelogDeclined,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionDeclined => write!(f, "Aborted! New version was not confirmed."),
            Self::ChangelogDeclined => write!(f, "Aborted! Changelog was not confirmed."),
        }
    }
}

/// Result of a release run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { version: Version, dry_run: bool },
    Halted(HaltReason),
    Cancelled(CancelReason),
}

impl ReleaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Released { .. })
    }
}
