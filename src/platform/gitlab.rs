//! GitLab platform service implementation

use crate::auth::get_gitlab_auth;
use crate::error::{Error, Result};
use crate::platform::detection::parse_gitlab_url;
use crate::platform::http::{client, declined_merge, read_json};
use crate::platform::{PlatformService, RepoId, aggregate_status, is_method_rejection};
use crate::retry::{RetryOptions, with_retry};
use crate::types::{
    AllowedMergeMethods, CheckState, MergeMethod, MergeOptions, MergeResult, Platform, PrReview,
    PrState, PullRequest, PullRequestRef, RepoCoordinates, ReviewState, StatusCheck,
    StatusCheckResult,
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Statuses GitLab uses to refuse a merge
const DECLINED_MERGE: [u16; 4] = [405, 406, 409, 422];

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    /// Instance root, e.g. `https://gitlab.com`
    base_url: String,
    /// Host passed to `glab auth token --hostname`
    host: String,
    retry: RetryOptions,
    token: OnceCell<String>,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
}

/// Extended MR details
#[derive(Deserialize)]
struct MergeRequestDetails {
    iid: u64,
    title: String,
    description: Option<String>,
    state: String, // "opened", "closed", "locked", "merged"
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    merge_status: String, // "can_be_merged", "cannot_be_merged", "checking", ...
    web_url: String,
    source_branch: String,
    target_branch: String,
    sha: Option<String>,
}

#[derive(Deserialize)]
struct MrApprovals {
    #[serde(default)]
    approved: bool,
    #[serde(default)]
    approved_by: Vec<Approver>,
}

#[derive(Deserialize)]
struct Approver {
    user: GitLabUser,
}

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Deserialize)]
struct CommitStatus {
    name: String,
    status: String,
}

#[derive(Deserialize)]
struct MergeResponse {
    state: String,
    merge_commit_sha: Option<String>,
    squash_commit_sha: Option<String>,
}

#[derive(Deserialize)]
struct Project {
    merge_method: Option<String>, // "merge", "rebase_merge", "ff"
    squash_option: Option<String>, // "never", "always", "default_on", "default_off"
}

impl From<MergeRequest> for PullRequestRef {
    fn from(mr: MergeRequest) -> Self {
        Self {
            number: mr.iid,
            url: mr.web_url,
        }
    }
}

impl From<MergeRequestDetails> for PullRequest {
    fn from(mr: MergeRequestDetails) -> Self {
        let state = match mr.state.as_str() {
            "opened" => PrState::Open,
            "merged" => PrState::Merged,
            _ => PrState::Closed,
        };
        let mergeable = match mr.merge_status.as_str() {
            "can_be_merged" => Some(true),
            s if s.starts_with("cannot_be_merged") => Some(false),
            _ => None,
        };

        Self {
            number: mr.iid,
            url: mr.web_url,
            title: mr.title,
            body: mr.description.unwrap_or_default(),
            state,
            is_draft: mr.draft,
            mergeable,
            head_ref: mr.source_branch,
            head_sha: mr.sha.unwrap_or_default(),
            base_ref: mr.target_branch,
        }
    }
}

fn check_state(status: &str) -> CheckState {
    match status {
        "success" => CheckState::Success,
        "failed" | "canceled" => CheckState::Failure,
        "skipped" | "manual" => CheckState::Skipped,
        // created, waiting_for_resource, preparing, pending, running, scheduled
        _ => CheckState::Pending,
    }
}

fn allowed_from_project(project: &Project) -> AllowedMergeMethods {
    let squash_option = project.squash_option.as_deref().unwrap_or("default_off");
    let merge_method = project.merge_method.as_deref().unwrap_or("merge");
    let squash_forced = squash_option == "always";

    AllowedMergeMethods {
        squash: squash_option != "never",
        merge: merge_method == "merge" && !squash_forced,
        rebase: matches!(merge_method, "rebase_merge" | "ff") && !squash_forced,
    }
}

impl GitLabService {
    /// Create a service for the instance at `base_url`
    pub fn new(base_url: &str, retry: RetryOptions) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let host = url::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid GitLab URL {base_url}: {e}")))?
            .host_str()
            .unwrap_or("gitlab.com")
            .to_string();

        Ok(Self {
            client: client()?,
            base_url,
            host,
            retry,
            token: OnceCell::new(),
        })
    }

    /// Create a service with a fixed token
    pub fn with_token(base_url: &str, token: &str, retry: RetryOptions) -> Result<Self> {
        let mut service = Self::new(base_url, retry)?;
        service.token = OnceCell::from(token.to_string());
        Ok(service)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    fn project_url(&self, repo: &RepoId, rest: &str) -> String {
        let project = format!("{}/{}", repo.owner, repo.repo);
        self.api_url(&format!("/projects/{}{rest}", urlencoding::encode(&project)))
    }

    /// Authenticated request with retry, decoding the JSON response
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let method = &method;
        with_retry(&self.retry, || async move {
            let token = self.get_token().await?;
            let mut request = self
                .client
                .request(method.clone(), url)
                .header("PRIVATE-TOKEN", token);
            if let Some(body) = body {
                request = request.json(body);
            }
            read_json(Platform::GitLab, request.send().await?).await
        })
        .await
    }

    async fn approvals(&self, repo: &RepoId, number: u64) -> Result<MrApprovals> {
        let url = self.project_url(repo, &format!("/merge_requests/{number}/approvals"));
        self.request(Method::GET, &url, None).await
    }
}

#[async_trait]
impl PlatformService for GitLabService {
    fn platform(&self) -> Platform {
        Platform::GitLab
    }

    async fn get_token(&self) -> Result<String> {
        self.token
            .get_or_try_init(|| async {
                get_gitlab_auth(Some(&self.host))
                    .await
                    .map(|auth| auth.token)
            })
            .await
            .cloned()
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
        debug!(%repo, head, base, draft, "creating MR");
        let title = if draft {
            format!("Draft: {title}")
        } else {
            title.to_string()
        };
        let payload = json!({
            "source_branch": head,
            "target_branch": base,
            "title": title,
            "description": body,
        });

        let url = self.project_url(repo, "/merge_requests");
        let mr: MergeRequest = self.request(Method::POST, &url, Some(&payload)).await?;

        debug!(%repo, mr_iid = mr.iid, "created MR");
        Ok(mr.into())
    }

    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequest> {
        debug!(%repo, mr_iid = number, "getting MR");
        let url = self.project_url(repo, &format!("/merge_requests/{number}"));
        let mr: MergeRequestDetails = self.request(Method::GET, &url, None).await?;

        let pr: PullRequest = mr.into();
        debug!(%repo, mr_iid = number, state = %pr.state, "got MR");
        Ok(pr)
    }

    async fn update_pull_request_body(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<()> {
        debug!(%repo, mr_iid = number, "updating MR description");
        let url = self.project_url(repo, &format!("/merge_requests/{number}"));
        let payload = json!({ "description": body });
        let _: Value = self.request(Method::PUT, &url, Some(&payload)).await?;
        Ok(())
    }

    async fn find_pr_by_branch(
        &self,
        repo: &RepoId,
        branch: &str,
    ) -> Result<Option<PullRequestRef>> {
        debug!(%repo, branch, "finding existing MR");
        let url = self.project_url(
            repo,
            &format!(
                "/merge_requests?source_branch={}&state=opened",
                urlencoding::encode(branch)
            ),
        );
        let mrs: Vec<MergeRequest> = self.request(Method::GET, &url, None).await?;

        let result: Option<PullRequestRef> = mrs.into_iter().next().map(Into::into);
        match &result {
            Some(pr) => debug!(%repo, mr_iid = pr.number, "found existing MR"),
            None => debug!(%repo, "no existing MR found"),
        }
        Ok(result)
    }

    async fn is_pull_request_approved(&self, repo: &RepoId, number: u64) -> Result<bool> {
        // The approvals endpoint is unavailable on some tiers; treat that as not approved
        match self.approvals(repo, number).await {
            Ok(approvals) => {
                debug!(%repo, mr_iid = number, approved = approvals.approved, "checked approval");
                Ok(approvals.approved)
            }
            Err(e) => {
                warn!(%repo, mr_iid = number, error = %e, "approvals endpoint unavailable, assuming not approved");
                Ok(false)
            }
        }
    }

    async fn get_pull_request_reviews(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<PrReview>> {
        debug!(%repo, mr_iid = number, "listing approvals");
        let approvals = self.approvals(repo, number).await?;
        Ok(approvals
            .approved_by
            .into_iter()
            .map(|a| PrReview {
                user: a.user.username,
                state: ReviewState::Approved,
                submitted_at: None,
            })
            .collect())
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        debug!(%repo, mr_iid = number, method = %options.method, "merging MR");
        let url = self.project_url(repo, &format!("/merge_requests/{number}/merge"));
        let payload = json!({
            "squash": options.method == MergeMethod::Squash,
            "should_remove_source_branch": options.delete_branch,
        });

        let response: MergeResponse = match self.request(Method::PUT, &url, Some(&payload)).await {
            Ok(response) => response,
            Err(e) => {
                debug!(%repo, mr_iid = number, error = %e, "merge declined or failed");
                return declined_merge(e, &DECLINED_MERGE);
            }
        };

        let merged = response.state == "merged";
        let result = MergeResult {
            merged,
            sha: response.merge_commit_sha.or(response.squash_commit_sha),
            message: (!merged).then(|| format!("merge request is {}", response.state)),
        };

        debug!(%repo, mr_iid = number, merged = result.merged, sha = ?result.sha, "merge complete");
        Ok(result)
    }

    async fn get_status_checks(&self, repo: &RepoId, git_ref: &str) -> Result<StatusCheckResult> {
        debug!(%repo, git_ref, "getting commit statuses");
        let url = self.project_url(
            repo,
            &format!("/repository/commits/{}/statuses", urlencoding::encode(git_ref)),
        );
        let statuses: Vec<CommitStatus> = match self.request(Method::GET, &url, None).await {
            Err(e) if e.status() == Some(404) => Vec::new(),
            other => other?,
        };

        let result = aggregate_status(
            statuses
                .into_iter()
                .map(|s| StatusCheck {
                    state: check_state(&s.status),
                    context: s.name,
                })
                .collect(),
        );
        debug!(%repo, git_ref, state = ?result.state, "got commit statuses");
        Ok(result)
    }

    /// 405 also answers conflicts, drafts and pending pipelines; only
    /// wording about squash or the method counts
    fn is_method_rejection(&self, message: &str) -> bool {
        message.to_ascii_lowercase().contains("squash") || is_method_rejection(message)
    }

    /// Merge commit vs. rebase is a project setting on GitLab; only squash is per-request
    fn effective_merge_method(&self, method: MergeMethod) -> MergeMethod {
        match method {
            MergeMethod::Squash => MergeMethod::Squash,
            MergeMethod::Rebase | MergeMethod::Merge => MergeMethod::Merge,
        }
    }

    async fn get_allowed_merge_methods(
        &self,
        repo: &RepoId,
    ) -> Result<Option<AllowedMergeMethods>> {
        debug!(%repo, "getting project merge settings");
        let url = self.project_url(repo, "");
        let project: Project = self.request(Method::GET, &url, None).await?;
        Ok(Some(allowed_from_project(&project)))
    }

    fn parse_repo_url(&self, url: &str) -> Option<RepoCoordinates> {
        parse_gitlab_url(url)
    }
}
