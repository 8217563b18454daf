//! Status command - show linked PRs and merge readiness

use crate::cli::context::CommandContext;
use crate::cli::style::{Stream, Stylize, check, hyperlink_url, mark, pending};
use anstream::println;
use anyhow::Result;
use codi_repo::linker::LinkedChange;
use codi_repo::merge::find_blocker;
use codi_repo::types::{LinkedPr, PrState};
use std::path::Path;

/// Run the status command
pub async fn run_status(workspace: Option<&Path>, branch: Option<&str>, json: bool) -> Result<()> {
    let ctx = CommandContext::new(workspace, branch).await?;
    let change = ctx.linker().get_linked_change(&ctx.branch).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&change)?);
        return Ok(());
    }

    let Some(change) = change else {
        println!("{}", format!("No PRs found for branch {}.", ctx.branch).muted());
        return Ok(());
    };

    print_change(&ctx.branch, &change);
    Ok(())
}

fn print_change(branch: &str, change: &LinkedChange) {
    match change.manifest() {
        Some(manifest) => println!(
            "{} #{} {} {}",
            "Manifest PR".emphasis(),
            manifest.number,
            manifest.title,
            hyperlink_url(Stream::Stdout, &manifest.url).muted()
        ),
        None => println!("{} {}", "Branch".emphasis(), branch.accent()),
    }
    println!();

    for pr in change.linked_prs() {
        print_linked_pr(pr);
    }
    println!();

    match find_blocker(change) {
        None if change.is_ready() => println!("{} Ready to merge", check()),
        None => println!("{} Not ready to merge", pending()),
        Some(blocker) => println!("{} Blocked: {}", pending(), blocker.to_string().warn()),
    }
}

fn print_linked_pr(pr: &LinkedPr) {
    if pr.is_orphaned() {
        println!(
            "  {} {} #{} {}",
            mark(false),
            pr.repo_name.accent(),
            pr.number,
            "(repository not in workspace)".warn()
        );
        return;
    }

    let state = match pr.state {
        PrState::Open => pr.state.to_string().success().to_string(),
        PrState::Merged => pr.state.to_string().accent().to_string(),
        PrState::Closed => pr.state.to_string().warn().to_string(),
    };
    let checks = pr
        .checks
        .map(|c| format!(" ({}/{} passed)", c.passed + c.skipped, c.total))
        .unwrap_or_default();

    println!(
        "  {} {} #{} {state}  approved {}  checks {}{}  mergeable {}",
        mark(pr.is_ready()),
        pr.repo_name.accent(),
        pr.number,
        mark(pr.approved),
        mark(pr.checks_pass),
        checks.muted(),
        mark(pr.mergeable)
    );
    println!("    {}", hyperlink_url(Stream::Stdout, &pr.url).muted());
}
