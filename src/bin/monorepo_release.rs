//! monorepo-release CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use semver::Version;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use monorepo_release::release::{generate_changelog, plan};
use monorepo_release::version::parse_custom;
use monorepo_release::{
    GitRepository, Release, ReleaseOptions, ReleaseOutcome, SystemRunner, TerminalPrompter,
};

/// Version, changelog and publish workflow for pnpm monorepos
#[derive(Parser)]
#[command(name = "monorepo-release")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bump versions, update the changelog, publish, commit and tag
    Release(ReleaseArgs),

    /// Show what a release to VERSION would change without writing anything
    Plan(PlanArgs),

    /// Regenerate the changelog for the latest release
    Changelog(ChangelogArgs),
}

#[derive(Args)]
struct ReleaseArgs {
    /// conventional-changelog preset
    #[arg(short, long)]
    preset: Option<String>,

    /// npm dist-tag to publish under
    #[arg(short, long)]
    tag: Option<String>,

    /// Branch the release must be cut from
    #[arg(short, long)]
    branch: Option<String>,

    /// Print publish, commit and tag commands instead of running them
    #[arg(short, long)]
    dry_run: bool,
}

#[derive(Args)]
struct PlanArgs {
    /// Target version for the workspace
    #[arg(value_parser = parse_custom)]
    version: Version,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ChangelogArgs {
    /// conventional-changelog preset
    #[arg(short, long)]
    preset: Option<String>,

    /// Print the command instead of running it
    #[arg(short, long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("monorepo_release=debug")
        } else {
            EnvFilter::new("monorepo_release=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let mut options = ReleaseOptions::load(&root)?;

    match cli.command {
        Commands::Release(args) => {
            if let Some(preset) = args.preset {
                options.preset = preset;
            }
            if let Some(tag) = args.tag {
                options.dist_tag = Some(tag);
            }
            if let Some(branch) = args.branch {
                options.expected_branch = Some(branch);
            }
            options.dry_run |= args.dry_run;

            let mut release = Release::new(
                &root,
                options,
                GitRepository::new(&root),
                SystemRunner,
                TerminalPrompter::stdio(),
            );
            let outcome = release.run().await?;
            if let ReleaseOutcome::Released { version, .. } = &outcome {
                tracing::debug!(%version, "released");
            }
            Ok(outcome.is_success())
        }
        Commands::Plan(args) => {
            let detector = Arc::new(GitRepository::new(&root));
            let report = plan(&root, &options, &args.version, detector).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} release {} -> {}",
                    report.kind.to_string().bold(),
                    report.from,
                    report.to.green()
                );
                for mutation in &report.mutations {
                    println!("  {}", mutation.to_string().yellow());
                }
                if report.mutations.is_empty() {
                    println!("{}", "Nothing to change.".dimmed());
                }
            }
            Ok(true)
        }
        Commands::Changelog(args) => {
            if let Some(preset) = args.preset {
                options.preset = preset;
            }
            options.dry_run |= args.dry_run;
            generate_changelog(&root, &options, &SystemRunner)?;
            Ok(true)
        }
    }
}
