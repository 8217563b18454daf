//! Merge orchestration for linked PRs
//!
//! Three-phase pattern:
//! 1. Gather - fetch the linked change from the live platforms (linker)
//! 2. Plan - readiness gate and `MergePlan` (pure, testable)
//! 3. Execute - sequential merges with method fallback (effectful)

mod execute;
mod fallback;
mod plan;
mod progress;

pub use execute::{
    FailedMerge, MergeAllOptions, MergeOutcome, MergeReport, MergedPr, SkippedMerge,
    execute_merge, merge_all_linked_prs,
};
pub use fallback::{MethodOutcome, fallback_order, merge_with_fallback};
pub use plan::{BlockReason, Blocker, MergePlan, MergeStep, block_reason, build_merge_plan, find_blocker};
pub use progress::{MergeProgress, NoopProgress};
