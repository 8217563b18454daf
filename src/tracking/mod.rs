//! Local breadcrumb of created manifest PRs
//!
//! The state file remembers which manifest PR belongs to which branch and the
//! last-known linked PRs of each manifest PR. It is advisory: the live
//! manifest PR body always wins over what is recorded here.

mod storage;

pub use storage::{load_state, save_state, state_path};

use crate::types::LinkedPr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted state, written wholesale on every save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    /// Manifest PR most recently created or updated
    #[serde(
        rename = "currentManifestPR",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_manifest_pr: Option<u64>,
    /// Branch name → manifest PR number
    #[serde(default)]
    pub branch_to_pr: BTreeMap<String, u64>,
    /// Manifest PR number → last-known linked PRs
    #[serde(default)]
    pub pr_links: BTreeMap<u64, Vec<LinkedPr>>,
}

impl StateFile {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `manifest_pr` as the manifest PR for `branch`
    pub fn record(&mut self, branch: &str, manifest_pr: u64, links: Vec<LinkedPr>) {
        self.branch_to_pr.insert(branch.to_string(), manifest_pr);
        self.pr_links.insert(manifest_pr, links);
        self.current_manifest_pr = Some(manifest_pr);
    }

    /// Manifest PR recorded for `branch`
    pub fn manifest_pr_for(&self, branch: &str) -> Option<u64> {
        self.branch_to_pr.get(branch).copied()
    }

    /// Last-known links of a manifest PR
    pub fn links_for(&self, manifest_pr: u64) -> Option<&[LinkedPr]> {
        self.pr_links.get(&manifest_pr).map(Vec::as_slice)
    }

    /// Drop everything recorded for `branch`
    ///
    /// Returns the manifest PR number that was forgotten.
    pub fn forget(&mut self, branch: &str) -> Option<u64> {
        let number = self.branch_to_pr.remove(branch)?;
        if !self.branch_to_pr.values().any(|n| *n == number) {
            self.pr_links.remove(&number);
        }
        if self.current_manifest_pr == Some(number) {
            self.current_manifest_pr = None;
        }
        Some(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    #[test]
    fn test_record_and_lookup() {
        let mut state = StateFile::new();
        state.record("feat", 12, vec![LinkedPr::orphaned("web", 3, Platform::GitHub)]);

        assert_eq!(state.manifest_pr_for("feat"), Some(12));
        assert_eq!(state.manifest_pr_for("other"), None);
        assert_eq!(state.links_for(12).unwrap().len(), 1);
        assert_eq!(state.current_manifest_pr, Some(12));
    }

    #[test]
    fn test_record_overwrites_links() {
        let mut state = StateFile::new();
        state.record("feat", 12, vec![LinkedPr::orphaned("web", 3, Platform::GitHub)]);
        state.record("feat", 12, Vec::new());
        assert!(state.links_for(12).unwrap().is_empty());
    }

    #[test]
    fn test_forget() {
        let mut state = StateFile::new();
        state.record("feat", 12, Vec::new());
        assert_eq!(state.forget("feat"), Some(12));
        assert_eq!(state, StateFile::new());
        assert_eq!(state.forget("feat"), None);
    }

    #[test]
    fn test_json_shape() {
        let mut state = StateFile::new();
        state.record("feat/login", 7, vec![LinkedPr::orphaned("api", 4, Platform::GitLab)]);

        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["currentManifestPR"], 7);
        assert_eq!(json["branchToPR"]["feat/login"], 7);
        assert_eq!(json["prLinks"]["7"][0]["repoName"], "api");
        assert_eq!(json["prLinks"]["7"][0]["platformType"], "gitlab");
    }

    #[test]
    fn test_missing_fields_default() {
        let state: StateFile = serde_json::from_str("{}").unwrap();
        assert_eq!(state, StateFile::new());
    }
}
