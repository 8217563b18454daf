//! Merge execution - effectful operations
//!
//! Takes a `MergePlan` (created by the pure planning functions) and merges
//! one PR at a time, children before the manifest PR, applying the
//! workspace's failure policy after every step.

use crate::error::{Error, Result};
use crate::linker::LinkedChange;
use crate::manifest::{Settings, Workspace};
use crate::merge::fallback::{MethodOutcome, merge_with_fallback};
use crate::merge::plan::{Blocker, MergePlan, MergeStep, build_merge_plan};
use crate::merge::progress::MergeProgress;
use crate::platform::{PlatformRegistry, RepoId};
use crate::types::{MergeMethod, MergeStrategy, RepoInfo};
use serde::Serialize;
use tracing::{debug, info};

/// Options for [`merge_all_linked_prs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeAllOptions {
    /// Failure policy
    pub strategy: MergeStrategy,
    /// Requested merge method; the fallback ladder may pick another
    pub method: MergeMethod,
    /// Delete head branches after merging
    pub delete_branch: bool,
    /// Skip the readiness gate
    pub force: bool,
}

impl MergeAllOptions {
    /// Options taken from workspace settings
    pub const fn from_settings(settings: &Settings) -> Self {
        Self {
            strategy: settings.merge_strategy,
            method: settings.merge_method,
            delete_branch: settings.delete_branch,
            force: false,
        }
    }
}

/// A PR that merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPr {
    /// Workspace repository name
    pub repo_name: String,
    /// PR number
    pub number: u64,
    /// Method that actually merged it
    pub method: MergeMethod,
    /// Merge commit, when the platform reports one
    pub sha: Option<String>,
}

/// A PR that did not merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMerge {
    /// Workspace repository name
    pub repo_name: String,
    /// PR number
    pub number: u64,
    /// Platform message or error
    pub reason: String,
}

/// A PR the plan left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedMerge {
    /// Workspace repository name
    pub repo_name: String,
    /// PR number
    pub number: u64,
    /// Why it was skipped
    pub reason: String,
}

/// What a merge run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Merged PRs, in merge order
    pub merged: Vec<MergedPr>,
    /// Failed PRs, in attempt order
    pub failed: Vec<FailedMerge>,
    /// Skipped PRs
    pub skipped: Vec<SkippedMerge>,
    /// Repositories never attempted because the run halted
    pub not_attempted: Vec<String>,
    /// Whether the all-or-nothing policy stopped the run
    pub halted: bool,
}

impl MergeReport {
    /// Check if nothing failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// First failure
    pub fn failed_pr(&self) -> Option<&FailedMerge> {
        self.failed.first()
    }

    /// Whether `repo_name` is among the merged
    pub fn merged_repo(&self, repo_name: &str) -> bool {
        self.merged.iter().any(|m| m.repo_name == repo_name)
    }
}

/// Result of [`merge_all_linked_prs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Readiness gate failed; nothing was merged
    NotReady(Blocker),
    /// The plan ran (possibly with failures)
    Completed(MergeReport),
}

/// Gate, plan and merge a linked change
pub async fn merge_all_linked_prs(
    registry: &PlatformRegistry,
    workspace: &Workspace,
    change: &LinkedChange,
    options: &MergeAllOptions,
    progress: &dyn MergeProgress,
) -> Result<MergeOutcome> {
    let plan = match build_merge_plan(change, options.force) {
        Ok(plan) => plan,
        Err(blocker) => {
            debug!(%blocker, "linked change not ready to merge");
            return Ok(MergeOutcome::NotReady(blocker));
        }
    };

    execute_merge(&plan, registry, workspace, options, progress)
        .await
        .map(MergeOutcome::Completed)
}

fn resolve<'w>(workspace: &'w Workspace, repo_name: &str, manifest: bool) -> Result<&'w RepoInfo> {
    if manifest {
        workspace
            .manifest
            .as_ref()
            .ok_or_else(|| Error::Config("no manifest repository configured".to_string()))
    } else {
        workspace.require_repo(repo_name)
    }
}

/// Execute the merge plan (EFFECTFUL)
///
/// Merges strictly one at a time. A merge the platform refuses, or any
/// error from the merge call, is recorded as a failure. Under
/// [`MergeStrategy::AllOrNothing`] the run stops at the first failure and
/// the remaining repositories are listed as not attempted.
pub async fn execute_merge(
    plan: &MergePlan,
    registry: &PlatformRegistry,
    workspace: &Workspace,
    options: &MergeAllOptions,
    progress: &dyn MergeProgress,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    for (index, step) in plan.steps.iter().enumerate() {
        let failure = match step {
            MergeStep::Skip {
                repo_name,
                number,
                reason,
            } => {
                progress.on_skipped(repo_name, *number, reason).await;
                report.skipped.push(SkippedMerge {
                    repo_name: repo_name.clone(),
                    number: *number,
                    reason: reason.clone(),
                });
                None
            }
            MergeStep::Fail {
                repo_name,
                number,
                reason,
            } => Some(FailedMerge {
                repo_name: repo_name.clone(),
                number: *number,
                reason: reason.to_string(),
            }),
            MergeStep::Merge {
                repo_name,
                number,
                manifest,
            } => {
                progress.on_merge_started(repo_name, *number).await;
                match merge_one(registry, workspace, repo_name, *number, *manifest, options).await {
                    Ok(merged) => {
                        info!(repo = %merged.repo_name, pr_number = merged.number, method = %merged.method, "merged");
                        if merged.method != options.method {
                            progress
                                .on_message(&format!(
                                    "{} #{} merged with {} instead of {}",
                                    merged.repo_name, merged.number, merged.method, options.method
                                ))
                                .await;
                        }
                        progress.on_merged(&merged).await;
                        report.merged.push(merged);
                        None
                    }
                    Err(reason) => Some(FailedMerge {
                        repo_name: repo_name.clone(),
                        number: *number,
                        reason,
                    }),
                }
            }
        };

        if let Some(failed) = failure {
            progress.on_failed(&failed).await;
            report.failed.push(failed);
            if options.strategy == MergeStrategy::AllOrNothing {
                report.halted = true;
                report.not_attempted = plan.steps[index + 1..]
                    .iter()
                    .map(|s| s.repo_name().to_string())
                    .collect();
                debug!(not_attempted = ?report.not_attempted, "halting merge run");
                if !report.not_attempted.is_empty() {
                    progress
                        .on_message(&format!(
                            "stopped after a failure; not attempted: {}",
                            report.not_attempted.join(", ")
                        ))
                        .await;
                }
                break;
            }
        }
    }

    Ok(report)
}

async fn attempt_merge(
    registry: &PlatformRegistry,
    workspace: &Workspace,
    repo_name: &str,
    number: u64,
    manifest: bool,
    options: &MergeAllOptions,
) -> Result<MethodOutcome> {
    let repo = resolve(workspace, repo_name, manifest)?;
    let service = registry.for_repo(repo)?;
    merge_with_fallback(
        service.as_ref(),
        &RepoId::from(repo),
        number,
        options.method,
        options.delete_branch,
    )
    .await
}

/// Merge one PR; the error side is the reason to report
async fn merge_one(
    registry: &PlatformRegistry,
    workspace: &Workspace,
    repo_name: &str,
    number: u64,
    manifest: bool,
    options: &MergeAllOptions,
) -> std::result::Result<MergedPr, String> {
    let outcome = attempt_merge(registry, workspace, repo_name, number, manifest, options)
        .await
        .map_err(|e| e.to_string())?;

    if outcome.result.merged {
        Ok(MergedPr {
            repo_name: repo_name.to_string(),
            number,
            method: outcome.method,
            sha: outcome.result.sha,
        })
    } else {
        Err(outcome
            .result
            .message
            .unwrap_or_else(|| "merge was not performed".to_string()))
    }
}
