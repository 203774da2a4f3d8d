//! External command execution.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::error::ReleaseError;

/// A program invocation, kept as data so it can be shown instead of run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string_lossy().into_owned()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Runs external tools (package manager, changelog generator, git).
pub trait CommandRunner {
    /// Run `command` in `cwd` with inherited stdio; a non-zero exit is an error.
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<()>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine, cwd: &Path) -> Result<()> {
        tracing::debug!(%command, cwd = %cwd.display(), "running");

        let status = Command::new(command.program())
            .args(command.get_args())
            .current_dir(cwd)
            .status()
            .with_context(|| format!("failed to spawn `{}`", command.program()))?;

        if !status.success() {
            return Err(ReleaseError::CommandFailed {
                command: command.to_string(),
                status: status.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
