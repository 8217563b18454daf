//! codi-repo - linked pull requests across repositories
//!
//! CLI binary for opening, inspecting and merging one logical change that
//! spans several GitHub, GitLab and Azure DevOps repositories.

use anyhow::Result;
use clap::{Parser, Subcommand};
use codi_repo::types::{MergeMethod, MergeStrategy, Platform};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "codi-repo")]
#[command(about = "Linked PRs across repositories - GitHub, GitLab & Azure DevOps")]
#[command(version)]
struct Cli {
    /// Workspace root holding codi-repo.toml (defaults to searching upward)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Branch the change lives on (defaults to the checked-out branch)
    #[arg(short, long, global = true)]
    branch: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Linked pull requests
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },

    /// Authentication management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand)]
enum PrAction {
    /// Open (or find) a PR in every repository with commits on the branch
    Create {
        /// PR title (defaults to the branch name)
        #[arg(short, long)]
        title: Option<String>,

        /// PR body
        #[arg(long)]
        body: Option<String>,

        /// Open PRs as drafts
        #[arg(long)]
        draft: bool,

        /// Do not push branches before opening PRs
        #[arg(long)]
        no_push: bool,
    },

    /// Show linked PRs and whether they are ready to merge
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge every linked PR, then the manifest PR
    Merge {
        /// Show the merge plan without merging
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Merge even if not every PR is ready
        #[arg(long)]
        force: bool,

        /// Failure policy: all-or-nothing or independent
        #[arg(long)]
        strategy: Option<MergeStrategy>,

        /// Merge method: squash, rebase or merge
        #[arg(long)]
        method: Option<MergeMethod>,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Check that a token can be found
    Test {
        /// github, gitlab or azure
        platform: Platform,

        /// Self-hosted instance hostname
        #[arg(long)]
        host: Option<String>,
    },
    /// Show authentication setup instructions
    Setup {
        /// github, gitlab or azure
        platform: Platform,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "codi_repo=debug,warn" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workspace = cli.workspace.as_deref();
    let branch = cli.branch.as_deref();

    match cli.command {
        Commands::Pr { action } => match action {
            PrAction::Create {
                title,
                body,
                draft,
                no_push,
            } => {
                let options = cli::CreateCommandOptions {
                    title,
                    body,
                    draft,
                    no_push,
                };
                cli::run_create(workspace, branch, options).await?;
            }
            PrAction::Status { json } => {
                cli::run_status(workspace, branch, json).await?;
            }
            PrAction::Merge {
                dry_run,
                yes,
                force,
                strategy,
                method,
            } => {
                let options = cli::MergeCommandOptions {
                    dry_run,
                    yes,
                    force,
                    strategy,
                    method,
                };
                cli::run_merge(workspace, branch, options).await?;
            }
        },
        Commands::Auth { action } => match action {
            AuthAction::Test { platform, host } => {
                cli::run_auth_test(platform, host.as_deref()).await?;
            }
            AuthAction::Setup { platform } => cli::run_auth_setup(platform),
        },
    }

    Ok(())
}
