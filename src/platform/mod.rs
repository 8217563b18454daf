//! Platform services for GitHub, GitLab and Azure DevOps
//!
//! Provides a unified interface for PR/MR operations across platforms.
//! Everything platform-specific (endpoints, state vocabularies, reference
//! syntax, URL grammar) lives behind [`PlatformService`].

mod aggregate;
mod azure;
mod detection;
mod github;
mod gitlab;
mod http;
mod links;
mod registry;

pub use aggregate::{aggregate_status, approval_from_reviews};
pub use azure::AzureDevOpsService;
pub use detection::{detect_platform, parse_repo_url};
pub use github::GitHubService;
pub use gitlab::GitLabService;
pub use links::{LINKS_MARKER_PREFIX, PrLink, generate_linked_pr_comment, parse_linked_pr_comment};
pub use registry::{PlatformRegistry, default_api_base};

use crate::error::Result;
use crate::types::{
    AllowedMergeMethods, LinkedPr, MergeMethod, MergeOptions, MergeResult, Platform, PrReview,
    PullRequest, PullRequestRef, RepoCoordinates, RepoInfo, StatusCheckResult,
};
use async_trait::async_trait;

/// Reason phrase of a bare HTTP 405, which says nothing about the merge method
const METHOD_NOT_ALLOWED_PHRASE: &str = "405 method not allowed";

/// Whether a merge refusal message names the merge method as the problem
///
/// A status code alone is not enough: platforms answer 405 for unmergeable
/// PRs too (conflicts, drafts, pending pipelines).
pub fn is_method_rejection(message: &str) -> bool {
    let message = message
        .to_ascii_lowercase()
        .replace(METHOD_NOT_ALLOWED_PHRASE, "");
    message.contains("not allowed")
        || message.contains("merge_method")
        || message.contains("merge method")
}

/// Platform-side identity of a repository
///
/// `project` is only set for Azure DevOps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    /// Owner, namespace or organization
    pub owner: String,
    /// Azure DevOps project
    pub project: Option<String>,
    /// Repository name
    pub repo: String,
}

impl RepoId {
    /// Owner/repo identity
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            project: None,
            repo: repo.into(),
        }
    }

    /// Owner/project/repo identity (Azure DevOps)
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

impl From<&RepoInfo> for RepoId {
    fn from(info: &RepoInfo) -> Self {
        Self {
            owner: info.owner.clone(),
            project: info.project.clone(),
            repo: info.repo.clone(),
        }
    }
}

impl From<&LinkedPr> for RepoId {
    fn from(pr: &LinkedPr) -> Self {
        Self {
            owner: pr.owner.clone(),
            project: pr.project.clone(),
            repo: pr.repo.clone(),
        }
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}/{}/{}", self.owner, project, self.repo),
            None => write!(f, "{}/{}", self.owner, self.repo),
        }
    }
}

/// Platform service trait for PR/MR operations
///
/// One implementation per hosting platform. Instances are immutable once
/// built and are shared through [`PlatformRegistry`]; all methods take the
/// target repository explicitly.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Which platform this service talks to
    fn platform(&self) -> Platform;

    /// Resolve the credential (environment, then companion CLI)
    ///
    /// Fails with [`crate::error::Error::Auth`] when nothing is found.
    async fn get_token(&self) -> Result<String>;

    /// Create a PR. GitLab expresses `draft` as a `Draft:` title prefix.
    #[allow(clippy::too_many_arguments)]
    async fn create_pull_request(
        &self,
        repo: &RepoId,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequestRef>;

    /// Fetch a PR with its state mapped to open/closed/merged
    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequest>;

    /// Replace a PR's body
    async fn update_pull_request_body(&self, repo: &RepoId, number: u64, body: &str)
    -> Result<()>;

    /// Find the open PR whose head is `branch`
    async fn find_pr_by_branch(&self, repo: &RepoId, branch: &str)
    -> Result<Option<PullRequestRef>>;

    /// Review aggregation for this platform
    async fn is_pull_request_approved(&self, repo: &RepoId, number: u64) -> Result<bool>;

    /// All reviews on a PR
    async fn get_pull_request_reviews(&self, repo: &RepoId, number: u64)
    -> Result<Vec<PrReview>>;

    /// Merge a PR
    ///
    /// A merge the platform declines (method not allowed, conflicts, policy)
    /// is `Ok` with `merged == false` and the platform's message; only
    /// transport and auth failures are errors. Branch deletion is best effort
    /// and never turns a successful merge into a failure.
    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        options: &MergeOptions,
    ) -> Result<MergeResult>;

    /// Aggregated CI status for a ref, see [`aggregate_status`]
    async fn get_status_checks(&self, repo: &RepoId, git_ref: &str) -> Result<StatusCheckResult>;

    /// Whether a declined merge was refused because of its method
    fn is_method_rejection(&self, message: &str) -> bool {
        is_method_rejection(message)
    }

    /// The method a merge requested with `method` actually performs here
    ///
    /// Platforms that cannot honor every method per request fold them onto
    /// the one they perform.
    fn effective_merge_method(&self, method: MergeMethod) -> MergeMethod {
        method
    }

    /// Merge methods the repository accepts, if the platform can tell
    async fn get_allowed_merge_methods(
        &self,
        _repo: &RepoId,
    ) -> Result<Option<AllowedMergeMethods>> {
        Ok(None)
    }

    /// Parse a remote URL in this platform's grammar
    fn parse_repo_url(&self, url: &str) -> Option<RepoCoordinates>;

    /// Whether a remote URL belongs to this platform
    fn matches_url(&self, url: &str) -> bool {
        self.parse_repo_url(url).is_some()
    }

    /// Build a link with this platform's reference sigil
    fn link(&self, repo_name: &str, number: u64) -> PrLink {
        PrLink::new(repo_name, number, self.platform())
    }

    /// Render the hidden links marker
    fn generate_linked_pr_comment(&self, links: &[PrLink]) -> String {
        generate_linked_pr_comment(links)
    }

    /// Parse the hidden links marker (accepts `#` and `!`)
    fn parse_linked_pr_comment(&self, body: &str) -> Vec<PrLink> {
        parse_linked_pr_comment(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_rejection_needs_method_wording() {
        assert!(is_method_rejection("HTTP 405: Merge commits are not allowed on this repository."));
        assert!(is_method_rejection("Squash merges are Not Allowed"));
        assert!(is_method_rejection("invalid merge_method"));
        assert!(!is_method_rejection("HTTP 405: 405 Method Not Allowed"));
        assert!(!is_method_rejection("HTTP 405: Pull Request is not mergeable"));
        assert!(!is_method_rejection("HTTP 409: Head branch was modified"));
    }
}
