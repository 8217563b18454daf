//! Mock platform service for testing

#![allow(dead_code)]

use async_trait::async_trait;
use codi_repo::error::{Error, Result};
use codi_repo::platform::{PlatformService, RepoId};
use codi_repo::types::{
    AllowedMergeMethods, CheckState, MergeMethod, MergeOptions, MergeResult, Platform, PrReview,
    PrState, PullRequest, PullRequestRef, RepoCoordinates, ReviewState, StatusCheck,
    StatusCheckResult,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Call record for `create_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub repo: String,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

/// Call record for `update_pull_request_body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBodyCall {
    pub repo: String,
    pub number: u64,
    pub body: String,
}

/// Call record for `merge_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub repo: String,
    pub number: u64,
    pub method: MergeMethod,
    pub delete_branch: bool,
}

type PrKey = (String, u64);

/// Hand-written in-memory platform
///
/// Repositories are keyed by their `owner/repo` display. PRs default to
/// approved with no CI (which aggregates to success).
///
/// Features:
/// - Auto-incrementing PR numbers
/// - Call tracking for verification
/// - Canned PRs, approvals and checks
/// - Merge refusals and errors per repository
/// - Allowed merge methods per repository
pub struct MockPlatformService {
    platform: Platform,
    next_pr_number: AtomicU64,
    prs: Mutex<HashMap<PrKey, PullRequest>>,
    unapproved: Mutex<Vec<PrKey>>,
    checks: Mutex<HashMap<(String, String), StatusCheckResult>>,
    allowed_methods: Mutex<HashMap<String, AllowedMergeMethods>>,
    merge_refusals: Mutex<HashMap<String, String>>,
    merge_errors: Mutex<HashMap<String, String>>,
    error_on_find_pr: Mutex<Option<String>>,
    // Call tracking
    create_calls: Mutex<Vec<CreatePrCall>>,
    update_body_calls: Mutex<Vec<UpdateBodyCall>>,
    merge_calls: Mutex<Vec<MergeCall>>,
    get_pr_calls: Mutex<Vec<PrKey>>,
}

impl MockPlatformService {
    /// Create a new mock for `platform`
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            next_pr_number: AtomicU64::new(100),
            prs: Mutex::new(HashMap::new()),
            unapproved: Mutex::new(Vec::new()),
            checks: Mutex::new(HashMap::new()),
            allowed_methods: Mutex::new(HashMap::new()),
            merge_refusals: Mutex::new(HashMap::new()),
            merge_errors: Mutex::new(HashMap::new()),
            error_on_find_pr: Mutex::new(None),
            create_calls: Mutex::new(Vec::new()),
            update_body_calls: Mutex::new(Vec::new()),
            merge_calls: Mutex::new(Vec::new()),
            get_pr_calls: Mutex::new(Vec::new()),
        }
    }

    // === Canned data ===

    /// Store a PR in `repo` (`owner/repo`)
    pub fn add_pr(&self, repo: &str, pr: PullRequest) {
        self.prs
            .lock()
            .unwrap()
            .insert((repo.to_string(), pr.number), pr);
    }

    /// Current stored copy of a PR
    pub fn pr(&self, repo: &str, number: u64) -> Option<PullRequest> {
        self.prs
            .lock()
            .unwrap()
            .get(&(repo.to_string(), number))
            .cloned()
    }

    /// Mark a PR as not approved
    pub fn set_unapproved(&self, repo: &str, number: u64) {
        self.unapproved
            .lock()
            .unwrap()
            .push((repo.to_string(), number));
    }

    /// Set the check aggregate for a ref
    pub fn set_checks(&self, repo: &str, git_ref: &str, state: CheckState) {
        let result = StatusCheckResult {
            state,
            statuses: vec![StatusCheck {
                context: "ci".to_string(),
                state,
            }],
        };
        self.checks
            .lock()
            .unwrap()
            .insert((repo.to_string(), git_ref.to_string()), result);
    }

    /// Restrict the merge methods `repo` accepts
    pub fn set_allowed_methods(&self, repo: &str, allowed: AllowedMergeMethods) {
        self.allowed_methods
            .lock()
            .unwrap()
            .insert(repo.to_string(), allowed);
    }

    // === Error injection ===

    /// Make every merge in `repo` come back refused with `message`
    pub fn refuse_merge(&self, repo: &str, message: &str) {
        self.merge_refusals
            .lock()
            .unwrap()
            .insert(repo.to_string(), message.to_string());
    }

    /// Make every merge in `repo` fail with an error
    pub fn fail_merge(&self, repo: &str, message: &str) {
        self.merge_errors
            .lock()
            .unwrap()
            .insert(repo.to_string(), message.to_string());
    }

    /// Make `find_pr_by_branch` return an error
    pub fn fail_find_pr(&self, message: &str) {
        *self.error_on_find_pr.lock().unwrap() = Some(message.to_string());
    }

    // === Call inspection ===

    pub fn create_calls(&self) -> Vec<CreatePrCall> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn update_body_calls(&self) -> Vec<UpdateBodyCall> {
        self.update_body_calls.lock().unwrap().clone()
    }

    pub fn merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    /// Repositories merged into, in call order
    pub fn merged_repos(&self) -> Vec<String> {
        self.merge_calls().into_iter().map(|c| c.repo).collect()
    }

    pub fn get_pr_calls(&self) -> Vec<(String, u64)> {
        self.get_pr_calls.lock().unwrap().clone()
    }

    fn method_allowed(&self, repo: &str, method: MergeMethod) -> bool {
        self.allowed_methods
            .lock()
            .unwrap()
            .get(repo)
            .is_none_or(|a| a.allows(method))
    }
}

/// An open, mergeable PR whose head SHA is `sha-<number>`
pub fn make_pr(number: u64, branch: &str) -> PullRequest {
    PullRequest {
        number,
        url: format!("https://example.com/pr/{number}"),
        title: format!("PR {number}"),
        body: String::new(),
        state: PrState::Open,
        is_draft: false,
        mergeable: Some(true),
        head_ref: branch.to_string(),
        head_sha: format!("sha-{number}"),
        base_ref: "main".to_string(),
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn get_token(&self) -> Result<String> {
        Ok("mock-token".to_string())
    }

    async fn create_pull_request(
        &self,
        repo: &RepoId,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequestRef> {
        let repo = repo.to_string();
        self.create_calls.lock().unwrap().push(CreatePrCall {
            repo: repo.clone(),
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            draft,
        });

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let mut pr = make_pr(number, head);
        pr.url = format!("https://example.com/{repo}/pull/{number}");
        pr.title = title.to_string();
        pr.body = body.to_string();
        pr.is_draft = draft;
        pr.base_ref = base.to_string();
        let pr_ref = pr.to_ref();
        self.add_pr(&repo, pr);
        Ok(pr_ref)
    }

    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequest> {
        let key = (repo.to_string(), number);
        self.get_pr_calls.lock().unwrap().push(key.clone());
        self.prs
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("PR {number} in {repo}")))
    }

    async fn update_pull_request_body(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<()> {
        let repo = repo.to_string();
        self.update_body_calls.lock().unwrap().push(UpdateBodyCall {
            repo: repo.clone(),
            number,
            body: body.to_string(),
        });
        let mut prs = self.prs.lock().unwrap();
        let pr = prs
            .get_mut(&(repo.clone(), number))
            .ok_or_else(|| Error::NotFound(format!("PR {number} in {repo}")))?;
        pr.body = body.to_string();
        Ok(())
    }

    async fn find_pr_by_branch(
        &self,
        repo: &RepoId,
        branch: &str,
    ) -> Result<Option<PullRequestRef>> {
        if let Some(message) = self.error_on_find_pr.lock().unwrap().clone() {
            return Err(Error::Platform(message));
        }
        let repo = repo.to_string();
        let prs = self.prs.lock().unwrap();
        let mut found: Vec<&PullRequest> = prs
            .iter()
            .filter(|((r, _), pr)| *r == repo && pr.head_ref == branch && pr.state == PrState::Open)
            .map(|(_, pr)| pr)
            .collect();
        found.sort_by_key(|pr| pr.number);
        Ok(found.first().map(|pr| pr.to_ref()))
    }

    async fn is_pull_request_approved(&self, repo: &RepoId, number: u64) -> Result<bool> {
        Ok(!self
            .unapproved
            .lock()
            .unwrap()
            .contains(&(repo.to_string(), number)))
    }

    async fn get_pull_request_reviews(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<PrReview>> {
        let state = if self.is_pull_request_approved(repo, number).await? {
            ReviewState::Approved
        } else {
            ReviewState::Commented
        };
        Ok(vec![PrReview {
            user: "reviewer".to_string(),
            state,
            submitted_at: None,
        }])
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        let repo = repo.to_string();
        self.merge_calls.lock().unwrap().push(MergeCall {
            repo: repo.clone(),
            number,
            method: options.method,
            delete_branch: options.delete_branch,
        });

        if let Some(message) = self.merge_errors.lock().unwrap().get(&repo) {
            return Err(Error::Platform(message.clone()));
        }
        if !self.method_allowed(&repo, options.method) {
            return Ok(MergeResult::rejected(format!(
                "HTTP 405: {} merges are not allowed on this repository",
                options.method
            )));
        }
        if let Some(message) = self.merge_refusals.lock().unwrap().get(&repo) {
            return Ok(MergeResult::rejected(message.clone()));
        }

        let mut prs = self.prs.lock().unwrap();
        let pr = prs
            .get_mut(&(repo.clone(), number))
            .ok_or_else(|| Error::NotFound(format!("PR {number} in {repo}")))?;
        pr.state = PrState::Merged;
        Ok(MergeResult {
            merged: true,
            sha: Some(format!("merge-{number}")),
            message: None,
        })
    }

    async fn get_status_checks(&self, repo: &RepoId, git_ref: &str) -> Result<StatusCheckResult> {
        Ok(self
            .checks
            .lock()
            .unwrap()
            .get(&(repo.to_string(), git_ref.to_string()))
            .cloned()
            .unwrap_or(StatusCheckResult {
                state: CheckState::Success,
                statuses: Vec::new(),
            }))
    }

    async fn get_allowed_merge_methods(
        &self,
        repo: &RepoId,
    ) -> Result<Option<AllowedMergeMethods>> {
        Ok(self
            .allowed_methods
            .lock()
            .unwrap()
            .get(&repo.to_string())
            .copied())
    }

    fn parse_repo_url(&self, _url: &str) -> Option<RepoCoordinates> {
        None
    }
}
