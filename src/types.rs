//! Core types for codi-repo

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hosting platform of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
    /// Azure DevOps Services
    #[serde(rename = "azure")]
    AzureDevOps,
}

impl Platform {
    /// Sigil used for PR references in this platform's markdown (`#12`, `!12`)
    pub const fn reference_sigil(self) -> char {
        match self {
            Self::GitLab => '!',
            Self::GitHub | Self::AzureDevOps => '#',
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
            Self::GitLab => write!(f, "GitLab"),
            Self::AzureDevOps => write!(f, "Azure DevOps"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            "azure" | "azure-devops" | "azuredevops" => Ok(Self::AzureDevOps),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Owner/repo coordinates parsed from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    /// Host name (e.g. "github.com")
    pub host: String,
    /// Owner, namespace (GitLab `group/subgroup`) or organization (Azure)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Azure DevOps project
    pub project: Option<String>,
}

/// A repository in the workspace
///
/// Built once from the workspace configuration and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Logical name, unique within the workspace
    pub name: String,
    /// Git remote URL
    pub url: String,
    /// Local clone path
    pub path: PathBuf,
    /// Branch PRs target
    pub default_branch: String,
    /// Owner/namespace/organization on the platform
    pub owner: String,
    /// Repository name on the platform
    pub repo: String,
    /// Azure DevOps project (None elsewhere)
    pub project: Option<String>,
    /// Hosting platform
    pub platform: Platform,
    /// Host name the repository lives on
    pub host: String,
}

/// Minimal identity of a created or discovered PR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// PR/MR number
    pub number: u64,
    /// Web URL
    pub url: String,
}

/// Unified PR state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    /// PR is open
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Platform-normalized pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Web URL
    pub url: String,
    /// Title
    pub title: String,
    /// Body/description
    pub body: String,
    /// Unified state
    pub state: PrState,
    /// Whether the PR is a draft
    pub is_draft: bool,
    /// Whether the PR can be merged
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = has conflicts
    /// - `None` = unknown (platform still computing)
    pub mergeable: Option<bool>,
    /// Head branch name
    pub head_ref: String,
    /// Head commit SHA
    pub head_sha: String,
    /// Base branch name
    pub base_ref: String,
}

impl PullRequest {
    /// Identity handle for this PR
    pub fn to_ref(&self) -> PullRequestRef {
        PullRequestRef {
            number: self.number,
            url: self.url.clone(),
        }
    }
}

/// State of a single CI check, or of an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    /// Check passed
    Success,
    /// Check failed
    Failure,
    /// Check is queued or running
    Pending,
    /// Check did not run; counts as passing
    Skipped,
}

/// One CI check or commit status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    /// Check name/context
    pub context: String,
    /// Normalized state
    pub state: CheckState,
}

/// Aggregated CI status for a ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheckResult {
    /// Overall state (never `Skipped`)
    pub state: CheckState,
    /// Individual checks
    pub statuses: Vec<StatusCheck>,
}

impl StatusCheckResult {
    /// Count checks by state
    pub fn summary(&self) -> CheckSummary {
        let mut summary = CheckSummary {
            total: self.statuses.len(),
            ..CheckSummary::default()
        };
        for status in &self.statuses {
            match status.state {
                CheckState::Success => summary.passed += 1,
                CheckState::Failure => summary.failed += 1,
                CheckState::Pending => summary.pending += 1,
                CheckState::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

/// Per-state check counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    /// Passed checks
    pub passed: usize,
    /// Failed checks
    pub failed: usize,
    /// Queued or running checks
    pub pending: usize,
    /// Skipped checks
    pub skipped: usize,
    /// All checks
    pub total: usize,
}

/// Normalized review state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    /// Reviewer approved
    Approved,
    /// Reviewer requested changes
    ChangesRequested,
    /// Comment-only review
    Commented,
    /// Review pending or dismissed
    Pending,
}

/// A single review on a PR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrReview {
    /// Reviewer login or display name
    pub user: String,
    /// Review state
    pub state: ReviewState,
    /// When the review was submitted, if the platform reports it
    pub submitted_at: Option<DateTime<Utc>>,
}

/// The orchestration's view of one child PR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct LinkedPr {
    /// Workspace repository name
    pub repo_name: String,
    /// Owner/namespace on the platform (empty when orphaned)
    pub owner: String,
    /// Repository name on the platform (empty when orphaned)
    pub repo: String,
    /// Azure DevOps project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Hosting platform
    #[serde(rename = "platformType")]
    pub platform: Platform,
    /// PR/MR number
    pub number: u64,
    /// Web URL
    pub url: String,
    /// Unified state
    pub state: PrState,
    /// Review aggregation result
    pub approved: bool,
    /// Whether the check aggregate is `success`
    pub checks_pass: bool,
    /// Whether the platform reports the PR as mergeable
    pub mergeable: bool,
    /// Detailed check counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<CheckSummary>,
}

impl LinkedPr {
    /// Placeholder for a link whose repository left the workspace
    pub fn orphaned(repo_name: &str, number: u64, platform: Platform) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            owner: String::new(),
            repo: String::new(),
            project: None,
            platform,
            number,
            url: String::new(),
            state: PrState::Closed,
            approved: false,
            checks_pass: false,
            mergeable: false,
            checks: None,
        }
    }

    /// Whether this link no longer resolves to a workspace repository
    pub fn is_orphaned(&self) -> bool {
        self.owner.is_empty() && self.repo.is_empty()
    }

    /// Whether this PR satisfies every merge precondition
    pub fn is_ready(&self) -> bool {
        self.state == PrState::Open && self.approved && self.checks_pass && self.mergeable
    }
}

/// The top-level PR and its linked children
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPr {
    /// Workspace name of the manifest repository
    pub repo_name: String,
    /// PR/MR number
    pub number: u64,
    /// Web URL
    pub url: String,
    /// Title
    pub title: String,
    /// Unified state
    pub state: PrState,
    /// Children in the order the body lists them
    pub linked_prs: Vec<LinkedPr>,
    /// Recomputed from live data on every fetch
    pub ready_to_merge: bool,
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    Squash,
    /// Create a merge commit
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl MergeMethod {
    /// Fallback preference order
    pub const LADDER: [Self; 3] = [Self::Squash, Self::Rebase, Self::Merge];
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

impl std::str::FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squash" => Ok(Self::Squash),
            "merge" => Ok(Self::Merge),
            "rebase" => Ok(Self::Rebase),
            other => Err(format!("unknown merge method: {other}")),
        }
    }
}

/// Merge methods a repository accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AllowedMergeMethods {
    /// Merge commits allowed
    pub merge: bool,
    /// Squash merges allowed
    pub squash: bool,
    /// Rebase merges allowed
    pub rebase: bool,
}

impl AllowedMergeMethods {
    /// Whether `method` is allowed
    pub const fn allows(&self, method: MergeMethod) -> bool {
        match method {
            MergeMethod::Merge => self.merge,
            MergeMethod::Squash => self.squash,
            MergeMethod::Rebase => self.rebase,
        }
    }
}

/// Options for a single merge call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Merge method
    pub method: MergeMethod,
    /// Delete the head branch after a successful merge (best effort)
    pub delete_branch: bool,
}

/// Result of a merge operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

impl MergeResult {
    /// A declined merge with the platform's explanation
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            merged: false,
            sha: None,
            message: Some(message.into()),
        }
    }
}

/// Failure policy for multi-repo merges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Halt at the first failed merge
    #[default]
    AllOrNothing,
    /// Attempt every repository regardless of earlier failures
    Independent,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllOrNothing => write!(f, "all-or-nothing"),
            Self::Independent => write!(f, "independent"),
        }
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all-or-nothing" => Ok(Self::AllOrNothing),
            "independent" => Ok(Self::Independent),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}
