//! The release workflow: gate, bump, changelog, publish, commit, tag.

use anyhow::{Context, Result};
use colored::Colorize;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ReleaseOptions;
use crate::error::{CancelReason, HaltReason, ReleaseError, ReleaseOutcome};
use crate::git::{branch_is_stale, ChangeDetector, Vcs};
use crate::graph::discover;
use crate::manifest::PackageManifest;
use crate::process::{CommandLine, CommandRunner};
use crate::prompt::Prompter;
use crate::propagate::{persist, propagate, PropagationReport};
use crate::version::select_new_version;
use crate::workspace::MANIFEST_FILE;

/// `<pm> exec conventional-changelog ...` for the configured preset.
pub fn changelog_command(options: &ReleaseOptions) -> CommandLine {
    CommandLine::new(&options.package_manager)
        .args(["exec", "conventional-changelog"])
        .args(["-i", "CHANGELOG.md", "-s", "-r", "1"])
        .args(["-p", options.preset.as_str()])
}

/// `<pm> publish -r --no-git-checks [--tag <dist_tag>]`.
pub fn publish_command(options: &ReleaseOptions) -> CommandLine {
    let command =
        CommandLine::new(&options.package_manager).args(["publish", "-r", "--no-git-checks"]);
    match &options.dist_tag {
        Some(tag) => command.args(["--tag", tag.as_str()]),
        None => command,
    }
}

fn git(args: &[&str]) -> CommandLine {
    CommandLine::new("git").args(args)
}

/// Run `commands` in `cwd`, or only print them under dry-run.
fn execute_or_show(
    runner: &dyn CommandRunner,
    cwd: &Path,
    dry_run: bool,
    commands: &[CommandLine],
) -> Result<()> {
    if dry_run {
        println!("{}", "(Dry run) Will execute:".dimmed());
        for command in commands {
            println!("{}", command);
        }
        return Ok(());
    }

    for command in commands {
        runner.run(command, cwd)?;
    }
    Ok(())
}

/// One release run over a workspace.
///
/// Collaborators are injected so the whole sequence can run against fakes.
pub struct Release<V, R, P> {
    root: PathBuf,
    options: ReleaseOptions,
    vcs: Arc<V>,
    runner: R,
    prompter: P,
}

impl<V, R, P> Release<V, R, P>
where
    V: Vcs + 'static,
    R: CommandRunner,
    P: Prompter,
{
    pub fn new(
        root: impl AsRef<Path>,
        options: ReleaseOptions,
        vcs: V,
        runner: R,
        prompter: P,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
            vcs: Arc::new(vcs),
            runner,
            prompter,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Run the full sequence.
    ///
    /// Halts and cancellations are outcomes; failures of git, the package
    /// manager or the filesystem are errors.
    pub async fn run(&mut self) -> Result<ReleaseOutcome> {
        if let Some(reason) = self.check_preconditions()? {
            println!("{}", reason.to_string().red());
            return Ok(ReleaseOutcome::Halted(reason));
        }

        let detector: Arc<dyn ChangeDetector> = self.vcs.clone();
        let mut graph = discover(&self.root, &self.options.packages_dir, detector).await?;

        let root_path = self.root.join(MANIFEST_FILE);
        let mut root_manifest = PackageManifest::load_root(&root_path)
            .context("Failed to read the workspace root manifest")?;
        let old = root_manifest.version.clone();

        println!(
            "{}",
            format!("Selecting new version from {}", old.to_string().bold()).blue()
        );
        let Some(new) = select_new_version(&old, &mut self.prompter)? else {
            return Ok(Self::cancel(CancelReason::VersionDeclined));
        };

        println!("{}", "Updating packages version...".blue());
        let report = match propagate(&mut graph, &old, &new) {
            Ok(report) => report,
            Err(ReleaseError::NoChanges) => {
                println!("{}", HaltReason::NoChanges.to_string().red());
                return Ok(ReleaseOutcome::Halted(HaltReason::NoChanges));
            }
            Err(e) => return Err(e.into()),
        };
        for mutation in &report.mutations {
            println!("{}", mutation.to_string().yellow());
        }

        println!("{}", "Updating root package.json version...".blue());
        root_manifest.set_version(&new);
        let written = persist(&graph, &[&root_manifest])?;
        tracing::info!(files = written, kind = %report.kind, version = %new, "manifests updated");

        println!("{}", "Updating lock file...".blue());
        self.runner.run(
            &CommandLine::new(&self.options.package_manager).arg("install"),
            &self.root,
        )?;

        println!("{}", "Updating changelog...".blue());
        self.runner
            .run(&changelog_command(&self.options), &self.root)?;
        if !self
            .prompter
            .confirm("Check the content of the changelog. Is it correct?")?
        {
            return Ok(Self::cancel(CancelReason::ChangelogDeclined));
        }

        let tag = format!("v{}", new);
        let dry_run = self.options.dry_run;

        println!("{}", "Publishing packages...".blue());
        execute_or_show(
            &self.runner,
            &self.root,
            dry_run,
            &[publish_command(&self.options)],
        )?;

        println!("{}", "Creating commit...".blue());
        execute_or_show(
            &self.runner,
            &self.root,
            dry_run,
            &[
                git(&["add", "."]),
                git(&["commit", "-m", tag.as_str()]),
                git(&["push"]),
            ],
        )?;

        println!("{}", "Creating git tag...".blue());
        execute_or_show(
            &self.runner,
            &self.root,
            dry_run,
            &[git(&["tag", tag.as_str()]), git(&["push", "--tags"])],
        )?;

        println!("{}", format!("Successfully released {}!", tag).green());
        if dry_run {
            println!(
                "{}",
                "Dry run. No packages were published to npm. No commits and tags were pushed."
                    .yellow()
            );
        }
        tracing::info!(%tag, dry_run, "release finished");

        Ok(ReleaseOutcome::Released {
            version: new,
            dry_run,
        })
    }

    fn check_preconditions(&self) -> Result<Option<HaltReason>> {
        if self.vcs.is_dirty().context("Failed to read git status")? {
            return Ok(Some(HaltReason::DirtyWorkingTree));
        }

        let Some(expected) = &self.options.expected_branch else {
            println!(
                "{}",
                "It's recommended to specify an expected branch for the release with --branch."
                    .yellow()
            );
            return Ok(None);
        };

        let actual = self.vcs.current_branch()?;
        if &actual != expected {
            return Ok(Some(HaltReason::WrongBranch {
                expected: expected.clone(),
                actual,
            }));
        }

        let report = self.vcs.remote_status(&self.options.remote)?;
        if branch_is_stale(&report, expected)? {
            return Ok(Some(HaltReason::StaleBranch {
                branch: expected.clone(),
            }));
        }

        Ok(None)
    }

    fn cancel(reason: CancelReason) -> ReleaseOutcome {
        println!("{}", reason.to_string().red());
        ReleaseOutcome::Cancelled(reason)
    }
}

/// Compute what a release to `new` would change, without touching disk.
pub async fn plan(
    root: &Path,
    options: &ReleaseOptions,
    new: &Version,
    detector: Arc<dyn ChangeDetector>,
) -> Result<PropagationReport> {
    let root_manifest = PackageManifest::load_root(root.join(MANIFEST_FILE))
        .context("Failed to read the workspace root manifest")?;
    let mut graph = discover(root, &options.packages_dir, detector).await?;
    Ok(propagate(&mut graph, &root_manifest.version, new)?)
}

/// Regenerate the changelog for the latest release only.
pub fn generate_changelog(
    root: &Path,
    options: &ReleaseOptions,
    runner: &dyn CommandRunner,
) -> Result<()> {
    println!("{}", "Updating changelog...".blue());
    execute_or_show(runner, root, options.dry_run, &[changelog_command(options)])
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
