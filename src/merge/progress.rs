//! Progress callback trait for merge execution
//!
//! The library never prints; the CLI implements this to draw spinners and
//! status lines.

use crate::merge::execute::{FailedMerge, MergedPr};
use async_trait::async_trait;

/// Receives updates while a merge plan executes
#[async_trait]
pub trait MergeProgress: Send + Sync {
    /// A merge call is about to be made
    async fn on_merge_started(&self, repo_name: &str, number: u64);

    /// A PR merged
    async fn on_merged(&self, merged: &MergedPr);

    /// A PR could not be merged
    async fn on_failed(&self, failed: &FailedMerge);

    /// A PR was skipped
    async fn on_skipped(&self, repo_name: &str, number: u64, reason: &str);

    /// Called with a general status message
    async fn on_message(&self, message: &str);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl MergeProgress for NoopProgress {
    async fn on_merge_started(&self, _repo_name: &str, _number: u64) {}
    async fn on_merged(&self, _merged: &MergedPr) {}
    async fn on_failed(&self, _failed: &FailedMerge) {}
    async fn on_skipped(&self, _repo_name: &str, _number: u64, _reason: &str) {}
    async fn on_message(&self, _message: &str) {}
}
