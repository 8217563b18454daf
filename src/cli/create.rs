//! Create command - open linked PRs for the current branch

use crate::cli::context::CommandContext;
use crate::cli::style::{Stream, Stylize, check, hyperlink_url, spinner_style};
use anstream::println;
use anyhow::Result;
use codi_repo::git::GitOps;
use codi_repo::linker::CreateOptions;
use codi_repo::types::RepoInfo;
use futures::future::join_all;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Options for the create command
#[derive(Debug, Clone, Default)]
pub struct CreateCommandOptions {
    /// PR title; defaults to the branch name
    pub title: Option<String>,
    /// PR body
    pub body: Option<String>,
    /// Open as drafts
    pub draft: bool,
    /// Skip pushing branches first
    pub no_push: bool,
}

/// Run the create command
pub async fn run_create(
    workspace: Option<&Path>,
    branch: Option<&str>,
    options: CreateCommandOptions,
) -> Result<()> {
    let ctx = CommandContext::new(workspace, branch).await?;
    let linker = ctx.linker();

    let sync = linker.check_branch_sync(&ctx.workspace.repos, &ctx.branch).await;
    if !sync.missing.is_empty() {
        println!(
            "{} branch {} not found in: {}",
            "Note:".warn(),
            ctx.branch.accent(),
            sync.missing.join(", ")
        );
    }

    let repos = participating_repos(&ctx.git, &ctx.workspace.repos, &sync.present).await;
    if repos.is_empty() {
        println!(
            "{}",
            format!("No repository has commits on {} ahead of its default branch.", ctx.branch).muted()
        );
        return Ok(());
    }

    let create = CreateOptions {
        title: options.title.unwrap_or_else(|| ctx.branch.clone()),
        body: options.body,
        draft: options.draft,
        push: !options.no_push,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Opening PRs in {} repositories...", repos.len()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    let report = linker.create_linked_prs(&repos, &ctx.branch, &create).await;
    spinner.finish_and_clear();
    let report = report?;

    for pr in &report.linked_prs {
        let verb = if report.created.contains(&pr.repo_name) {
            "Created"
        } else {
            "Found"
        };
        println!(
            "{} {verb} {} #{} {}",
            check(),
            pr.repo_name.accent(),
            pr.number,
            hyperlink_url(Stream::Stdout, &pr.url).muted()
        );
    }

    if let Some(manifest) = &report.manifest_pr {
        let verb = if report.manifest_created { "Created" } else { "Updated" };
        println!(
            "{} {verb} manifest PR #{} {}",
            check(),
            manifest.number,
            hyperlink_url(Stream::Stdout, &manifest.url).muted()
        );
    }

    Ok(())
}

/// Repositories that have the branch and commits on it, in workspace order
async fn participating_repos(
    git: &dyn GitOps,
    repos: &[RepoInfo],
    present: &[String],
) -> Vec<RepoInfo> {
    let candidates: Vec<&RepoInfo> = repos.iter().filter(|r| present.contains(&r.name)).collect();
    let ahead = join_all(
        candidates
            .iter()
            .map(|repo| git.has_commits_ahead(&repo.path, &repo.default_branch)),
    )
    .await;

    candidates
        .into_iter()
        .zip(ahead)
        .filter_map(|(repo, ahead)| match ahead {
            Ok(true) => Some(repo.clone()),
            Ok(false) => None,
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "could not compare with default branch");
                None
            }
        })
        .collect()
}
