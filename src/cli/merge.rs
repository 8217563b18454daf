//! Merge command - merge every linked PR, then the manifest PR

use crate::cli::context::CommandContext;
use crate::cli::progress::CliProgress;
use crate::cli::style::{Stylize, check, cross};
use anstream::{eprintln, println};
use anyhow::{Context, Result, bail};
use codi_repo::manifest::MANIFEST_REPO_NAME;
use codi_repo::merge::{
    Blocker, MergeAllOptions, MergeOutcome, MergePlan, MergeReport, MergeStep, build_merge_plan,
    merge_all_linked_prs,
};
use codi_repo::tracking::{load_state, save_state};
use codi_repo::types::{MergeMethod, MergeStrategy};
use dialoguer::Confirm;
use std::path::Path;

/// Options for the merge command
#[derive(Debug, Clone, Default)]
pub struct MergeCommandOptions {
    /// Show the plan without merging
    pub dry_run: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Skip the readiness gate
    pub force: bool,
    /// Override the workspace failure policy
    pub strategy: Option<MergeStrategy>,
    /// Override the workspace merge method
    pub method: Option<MergeMethod>,
}

/// Run the merge command
pub async fn run_merge(
    workspace: Option<&Path>,
    branch: Option<&str>,
    options: MergeCommandOptions,
) -> Result<()> {
    let ctx = CommandContext::new(workspace, branch).await?;

    let Some(change) = ctx.linker().get_linked_change(&ctx.branch).await? else {
        println!("{}", format!("No PRs found for branch {}.", ctx.branch).muted());
        return Ok(());
    };

    let mut merge_options = MergeAllOptions::from_settings(&ctx.workspace.settings);
    merge_options.force = options.force;
    if let Some(strategy) = options.strategy {
        merge_options.strategy = strategy;
    }
    if let Some(method) = options.method {
        merge_options.method = method;
    }

    // Preview only; merge_all_linked_prs gates and plans again
    let plan = match build_merge_plan(&change, merge_options.force) {
        Ok(plan) => plan,
        Err(blocker) => return not_ready(&blocker),
    };

    if options.dry_run {
        print_plan(&plan, &merge_options);
        return Ok(());
    }

    if plan.is_empty() {
        println!("{}", "Nothing to merge.".muted());
        return Ok(());
    }

    if !options.yes {
        print_plan(&plan, &merge_options);
        if !Confirm::new()
            .with_prompt("Proceed with merge?")
            .default(false)
            .interact()
            .context("failed to read confirmation")?
        {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
        println!();
    }

    let progress = CliProgress::new();
    let outcome = merge_all_linked_prs(
        &ctx.registry,
        &ctx.workspace,
        &change,
        &merge_options,
        &progress,
    )
    .await?;
    let report = match outcome {
        MergeOutcome::Completed(report) => report,
        MergeOutcome::NotReady(blocker) => return not_ready(&blocker),
    };

    if report.merged_repo(MANIFEST_REPO_NAME) {
        let mut state = load_state(&ctx.workspace.root)?;
        if state.forget(&ctx.branch).is_some() {
            save_state(&ctx.workspace.root, &state)?;
        }
    }

    print_summary(&report);
    if !report.is_success() {
        bail!("{} of {} PR(s) failed to merge", report.failed.len(), plan.merge_count());
    }
    Ok(())
}

fn not_ready(blocker: &Blocker) -> Result<()> {
    bail!("not ready to merge: {blocker} (use --force to merge anyway)")
}

fn print_plan(plan: &MergePlan, options: &MergeAllOptions) {
    println!(
        "{} {} {}",
        "Merge plan".emphasis(),
        format!("({}, {})", options.strategy, options.method).muted(),
        if options.force { "forced".warn().to_string() } else { String::new() }
    );
    for step in &plan.steps {
        match step {
            MergeStep::Merge { .. } => println!("  {} {step}", "→".accent()),
            MergeStep::Skip { .. } => println!("  {} {}", "-".muted(), step.to_string().muted()),
            MergeStep::Fail { .. } => println!("  {} {}", cross(), step.to_string().warn()),
        }
    }
    println!();
}

fn print_summary(report: &MergeReport) {
    println!();
    if report.is_success() {
        println!("{} Merged {} PR(s)", check(), report.merged.len());
        return;
    }

    eprintln!(
        "{} merged {}, failed {}",
        "Merge incomplete:".error(),
        report.merged.len(),
        report.failed.len()
    );
    for failed in &report.failed {
        eprintln!("  {} {} #{}: {}", cross(), failed.repo_name, failed.number, failed.reason);
    }
    if report.halted && !report.not_attempted.is_empty() {
        eprintln!("  not attempted: {}", report.not_attempted.join(", "));
    }
}
