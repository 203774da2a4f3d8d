//! Release tooling for multi-package JavaScript repositories.
//!
//! This crate discovers the publishable packages of a workspace, works out
//! which of them changed since the last release tag, bumps versions and
//! internal dependency ranges consistently, and drives the changelog,
//! publish, commit and tag steps.

pub mod config;
pub mod error;
pub mod git;
pub mod graph;
pub mod manifest;
pub mod process;
pub mod prompt;
pub mod propagate;
pub mod release;
pub mod version;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use config::ReleaseOptions;
pub use error::{CancelReason, HaltReason, ReleaseError, ReleaseOutcome, VersionError};
pub use git::{ChangeDetector, GitRepository, Vcs};
pub use graph::{Package, PackageGraph};
pub use manifest::PackageManifest;
pub use process::{CommandLine, CommandRunner, SystemRunner};
pub use prompt::{Prompter, TerminalPrompter};
pub use propagate::{Mutation, PropagationReport, ReleaseKind};
pub use release::Release;
pub use version::ReleaseType;
pub use workspace::WorkspaceScanner;
