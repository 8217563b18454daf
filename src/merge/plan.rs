//! Merge planning - pure functions for creating merge plans
//!
//! No I/O happens here. The readiness gate and the step list are derived
//! from an already fetched [`LinkedChange`].

use crate::linker::LinkedChange;
use crate::types::{LinkedPr, PrState};
use serde::Serialize;

/// Unmet merge precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "reason", content = "state")]
pub enum BlockReason {
    /// PR is closed or already merged
    NotOpen(PrState),
    /// Linked repository is no longer in the workspace
    Orphaned,
    /// Review aggregation says not approved
    NotApproved,
    /// CI aggregate is not `success`
    ChecksFailing,
    /// Platform reports conflicts or has not computed mergeability
    NotMergeable,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen(state) => write!(f, "not open ({state})"),
            Self::Orphaned => write!(f, "repository not in workspace"),
            Self::NotApproved => write!(f, "not approved"),
            Self::ChecksFailing => write!(f, "checks failing"),
            Self::NotMergeable => write!(f, "not mergeable"),
        }
    }
}

/// The first PR that stops a merge, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocker {
    /// Workspace repository name (`manifest` for the manifest PR)
    pub repo_name: String,
    /// PR number
    pub number: u64,
    /// Failed constraint
    pub reason: BlockReason,
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}: {}", self.repo_name, self.number, self.reason)
    }
}

/// First unmet precondition for one linked PR
///
/// Checked in order: orphaned, open, approved, checks, mergeable.
pub fn block_reason(pr: &LinkedPr) -> Option<BlockReason> {
    if pr.is_orphaned() {
        Some(BlockReason::Orphaned)
    } else if pr.state != PrState::Open {
        Some(BlockReason::NotOpen(pr.state))
    } else if !pr.approved {
        Some(BlockReason::NotApproved)
    } else if !pr.checks_pass {
        Some(BlockReason::ChecksFailing)
    } else if !pr.mergeable {
        Some(BlockReason::NotMergeable)
    } else {
        None
    }
}

/// First blocker of a change, manifest PR first, then children in order
pub fn find_blocker(change: &LinkedChange) -> Option<Blocker> {
    if let Some(manifest) = change.manifest()
        && manifest.state != PrState::Open
    {
        return Some(Blocker {
            repo_name: manifest.repo_name.clone(),
            number: manifest.number,
            reason: BlockReason::NotOpen(manifest.state),
        });
    }

    change.linked_prs().iter().find_map(|pr| {
        block_reason(pr).map(|reason| Blocker {
            repo_name: pr.repo_name.clone(),
            number: pr.number,
            reason,
        })
    })
}

/// A single step in the merge plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStep {
    /// Merge this PR
    Merge {
        /// Workspace repository name
        repo_name: String,
        /// PR number
        number: u64,
        /// Whether this is the manifest PR
        manifest: bool,
    },
    /// Leave this PR alone (already merged)
    Skip {
        /// Workspace repository name
        repo_name: String,
        /// PR number
        number: u64,
        /// Why it is skipped
        reason: String,
    },
    /// Cannot be merged; reported as a failure when reached
    Fail {
        /// Workspace repository name
        repo_name: String,
        /// PR number
        number: u64,
        /// Failed constraint
        reason: BlockReason,
    },
}

impl MergeStep {
    /// Repository this step concerns
    pub fn repo_name(&self) -> &str {
        match self {
            Self::Merge { repo_name, .. }
            | Self::Skip { repo_name, .. }
            | Self::Fail { repo_name, .. } => repo_name,
        }
    }
}

impl std::fmt::Display for MergeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge {
                repo_name,
                number,
                manifest,
            } => {
                let kind = if *manifest { "merge manifest" } else { "merge" };
                write!(f, "{kind} {repo_name} #{number}")
            }
            Self::Skip {
                repo_name,
                number,
                reason,
            } => write!(f, "skip {repo_name} #{number}: {reason}"),
            Self::Fail {
                repo_name,
                number,
                reason,
            } => write!(f, "cannot merge {repo_name} #{number}: {reason}"),
        }
    }
}

/// Ordered merge steps; children first, manifest PR last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Steps in execution order
    pub steps: Vec<MergeStep>,
}

impl MergePlan {
    /// Check if the plan has any merge steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merge_count() == 0
    }

    /// Count PRs that will be merged
    #[must_use]
    pub fn merge_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, MergeStep::Merge { .. }))
            .count()
    }
}

/// Create a merge plan (PURE - no I/O, easily testable)
///
/// Without `force` the change must pass the readiness gate, otherwise the
/// first [`Blocker`] is returned. With `force` the gate is skipped: already
/// merged PRs become [`MergeStep::Skip`] and PRs that can never merge
/// (orphaned, closed) become [`MergeStep::Fail`].
pub fn build_merge_plan(change: &LinkedChange, force: bool) -> Result<MergePlan, Blocker> {
    if !force && let Some(blocker) = find_blocker(change) {
        return Err(blocker);
    }

    let mut steps: Vec<MergeStep> = change.linked_prs().iter().map(child_step).collect();

    if let Some(manifest) = change.manifest() {
        let step = match manifest.state {
            PrState::Open => MergeStep::Merge {
                repo_name: manifest.repo_name.clone(),
                number: manifest.number,
                manifest: true,
            },
            PrState::Merged => MergeStep::Skip {
                repo_name: manifest.repo_name.clone(),
                number: manifest.number,
                reason: "already merged".to_string(),
            },
            PrState::Closed => MergeStep::Fail {
                repo_name: manifest.repo_name.clone(),
                number: manifest.number,
                reason: BlockReason::NotOpen(PrState::Closed),
            },
        };
        steps.push(step);
    }

    Ok(MergePlan { steps })
}

fn child_step(pr: &LinkedPr) -> MergeStep {
    let repo_name = pr.repo_name.clone();
    let number = pr.number;
    if pr.is_orphaned() {
        return MergeStep::Fail {
            repo_name,
            number,
            reason: BlockReason::Orphaned,
        };
    }
    match pr.state {
        PrState::Open => MergeStep::Merge {
            repo_name,
            number,
            manifest: false,
        },
        PrState::Merged => MergeStep::Skip {
            repo_name,
            number,
            reason: "already merged".to_string(),
        },
        PrState::Closed => MergeStep::Fail {
            repo_name,
            number,
            reason: BlockReason::NotOpen(PrState::Closed),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ManifestPr, Platform};

    fn ready_pr(name: &str, number: u64) -> LinkedPr {
        LinkedPr {
            repo_name: name.to_string(),
            owner: "acme".to_string(),
            repo: name.to_string(),
            project: None,
            platform: Platform::GitHub,
            number,
            url: format!("https://github.com/acme/{name}/pull/{number}"),
            state: PrState::Open,
            approved: true,
            checks_pass: true,
            mergeable: true,
            checks: None,
        }
    }

    fn manifest_change(state: PrState, linked_prs: Vec<LinkedPr>) -> LinkedChange {
        let ready_to_merge = state == PrState::Open && linked_prs.iter().all(LinkedPr::is_ready);
        LinkedChange::Manifest(ManifestPr {
            repo_name: "manifest".to_string(),
            number: 100,
            url: "https://github.com/acme/workspace/pull/100".to_string(),
            title: "Cross-repo change".to_string(),
            state,
            linked_prs,
            ready_to_merge,
        })
    }

    #[test]
    fn test_ready_change_has_no_blocker() {
        let change = manifest_change(PrState::Open, vec![ready_pr("api", 1), ready_pr("web", 2)]);
        assert!(change.is_ready());
        assert_eq!(find_blocker(&change), None);
    }

    #[test]
    fn test_each_unmet_constraint_is_named() {
        let cases: Vec<(fn(&mut LinkedPr), BlockReason)> = vec![
            (|p: &mut LinkedPr| p.state = PrState::Closed, BlockReason::NotOpen(PrState::Closed)),
            (|p: &mut LinkedPr| p.approved = false, BlockReason::NotApproved),
            (|p: &mut LinkedPr| p.checks_pass = false, BlockReason::ChecksFailing),
            (|p: &mut LinkedPr| p.mergeable = false, BlockReason::NotMergeable),
        ];
        for (mutate, expected) in cases {
            let mut blocked = ready_pr("web", 2);
            mutate(&mut blocked);
            let change = manifest_change(PrState::Open, vec![ready_pr("api", 1), blocked]);
            assert!(!change.is_ready());
            let blocker = find_blocker(&change).unwrap();
            assert_eq!(blocker.repo_name, "web");
            assert_eq!(blocker.number, 2);
            assert_eq!(blocker.reason, expected);
        }
    }

    #[test]
    fn test_first_blocker_in_manifest_order() {
        let mut api = ready_pr("api", 1);
        api.checks_pass = false;
        let mut web = ready_pr("web", 2);
        web.approved = false;
        let change = manifest_change(PrState::Open, vec![api, web]);
        let blocker = find_blocker(&change).unwrap();
        assert_eq!(blocker.repo_name, "api");
        assert_eq!(blocker.reason, BlockReason::ChecksFailing);
    }

    #[test]
    fn test_closed_manifest_blocks_first() {
        let mut api = ready_pr("api", 1);
        api.approved = false;
        let change = manifest_change(PrState::Closed, vec![api]);
        let blocker = find_blocker(&change).unwrap();
        assert_eq!(blocker.repo_name, "manifest");
        assert_eq!(blocker.reason, BlockReason::NotOpen(PrState::Closed));
        assert_eq!(blocker.to_string(), "manifest #100: not open (closed)");
    }

    #[test]
    fn test_orphan_blocks() {
        let change = manifest_change(
            PrState::Open,
            vec![ready_pr("api", 1), LinkedPr::orphaned("gone", 9, Platform::GitLab)],
        );
        assert_eq!(find_blocker(&change).unwrap().reason, BlockReason::Orphaned);
    }

    #[test]
    fn test_plan_orders_children_then_manifest() {
        let change = manifest_change(PrState::Open, vec![ready_pr("api", 1), ready_pr("web", 2)]);
        let plan = build_merge_plan(&change, false).unwrap();
        let names: Vec<_> = plan.steps.iter().map(MergeStep::repo_name).collect();
        assert_eq!(names, vec!["api", "web", "manifest"]);
        assert_eq!(plan.merge_count(), 3);
        assert!(matches!(
            plan.steps.last(),
            Some(MergeStep::Merge { manifest: true, .. })
        ));
    }

    #[test]
    fn test_plan_refuses_unready_without_force() {
        let mut web = ready_pr("web", 2);
        web.mergeable = false;
        let change = manifest_change(PrState::Open, vec![web]);
        let blocker = build_merge_plan(&change, false).unwrap_err();
        assert_eq!(blocker.reason, BlockReason::NotMergeable);
    }

    #[test]
    fn test_forced_plan_skips_merged_and_fails_orphans() {
        let mut merged = ready_pr("api", 1);
        merged.state = PrState::Merged;
        let mut unapproved = ready_pr("web", 2);
        unapproved.approved = false;
        let change = manifest_change(
            PrState::Open,
            vec![merged, unapproved, LinkedPr::orphaned("gone", 3, Platform::GitHub)],
        );

        let plan = build_merge_plan(&change, true).unwrap();
        assert!(matches!(&plan.steps[0], MergeStep::Skip { repo_name, .. } if repo_name == "api"));
        assert!(matches!(&plan.steps[1], MergeStep::Merge { repo_name, .. } if repo_name == "web"));
        assert!(matches!(
            &plan.steps[2],
            MergeStep::Fail { reason: BlockReason::Orphaned, .. }
        ));
        assert!(matches!(&plan.steps[3], MergeStep::Merge { manifest: true, .. }));
        assert_eq!(plan.merge_count(), 2);
    }

    #[test]
    fn test_branch_only_plan_has_no_manifest_step() {
        let change = LinkedChange::BranchOnly {
            branch: "feat/x".to_string(),
            linked_prs: vec![ready_pr("api", 1)],
        };
        let plan = build_merge_plan(&change, false).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].to_string(), "merge api #1");
    }
}
