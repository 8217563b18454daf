//! GitHub platform service implementation

use crate::auth::get_github_auth;
use crate::error::{Error, Result};
use crate::platform::detection::parse_github_url;
use crate::platform::http::{client, declined_merge, ensure_success, read_json};
use crate::platform::{RepoId, aggregate_status, approval_from_reviews, PlatformService};
use crate::retry::{RetryOptions, with_retry};
use crate::types::{
    AllowedMergeMethods, CheckState, MergeMethod, MergeOptions, MergeResult, Platform, PrReview,
    PrState, PullRequest, PullRequestRef, RepoCoordinates, ReviewState, StatusCheck,
    StatusCheckResult,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const PUBLIC_API: &str = "https://api.github.com";

/// Statuses GitHub uses to refuse a merge (method not allowed, conflict, not mergeable)
const DECLINED_MERGE: [u16; 3] = [405, 409, 422];

/// GitHub service using octocrab
///
/// Pull request CRUD, reviews and merges go through octocrab; commit
/// statuses, check runs, repository settings and ref deletion use raw REST.
pub struct GitHubService {
    /// API base, `https://api.github.com` or `https://<host>/api/v3`
    base_url: String,
    /// Host passed to `gh auth token --hostname` (None for github.com)
    host: Option<String>,
    retry: RetryOptions,
    http_client: Client,
    token: OnceCell<String>,
    client: OnceCell<Octocrab>,
}

impl GitHubService {
    /// Create a service for the API at `base_url`
    ///
    /// No credential is resolved and no network call is made until the
    /// first request.
    pub fn new(base_url: &str, retry: RetryOptions) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let host = if base_url == PUBLIC_API {
            None
        } else {
            url::Url::parse(&base_url)
                .map_err(|e| Error::Config(format!("invalid GitHub API URL {base_url}: {e}")))?
                .host_str()
                .map(ToString::to_string)
        };

        Ok(Self {
            base_url,
            host,
            retry,
            http_client: client()?,
            token: OnceCell::new(),
            client: OnceCell::new(),
        })
    }

    /// Create a service with a fixed token
    pub fn with_token(base_url: &str, token: &str, retry: RetryOptions) -> Result<Self> {
        let mut service = Self::new(base_url, retry)?;
        service.token = OnceCell::from(token.to_string());
        Ok(service)
    }

    async fn client(&self) -> Result<&Octocrab> {
        self.client
            .get_or_try_init(|| async {
                let token = self.get_token().await?;
                let mut builder = Octocrab::builder().personal_token(token);
                if self.base_url != PUBLIC_API {
                    builder = builder
                        .base_uri(self.base_url.as_str())
                        .map_err(|e| Error::Config(format!("invalid GitHub API URL: {e}")))?;
                }
                builder.build().map_err(Error::from)
            })
            .await
    }

    /// Raw authenticated GET returning decoded JSON
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let url = url.as_str();
        with_retry(&self.retry, || async move {
            let token = self.get_token().await?;
            let response = self
                .http_client
                .get(url)
                .bearer_auth(token)
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28")
                .send()
                .await?;
            read_json(Platform::GitHub, response).await
        })
        .await
    }

    /// Legacy commit statuses, used by external CI services
    async fn commit_statuses(&self, repo: &RepoId, git_ref: &str) -> Result<Vec<StatusCheck>> {
        #[derive(Deserialize)]
        struct CombinedStatus {
            #[serde(default)]
            statuses: Vec<CommitStatus>,
        }

        #[derive(Deserialize)]
        struct CommitStatus {
            context: String,
            state: String,
        }

        let path = format!(
            "/repos/{}/{}/commits/{}/status",
            repo.owner,
            repo.repo,
            urlencoding::encode(git_ref)
        );
        let combined: CombinedStatus = match self.get_json(&path).await {
            Err(e) if e.status() == Some(404) => return Ok(Vec::new()),
            other => other?,
        };

        Ok(combined
            .statuses
            .into_iter()
            .map(|s| StatusCheck {
                state: match s.state.as_str() {
                    "success" => CheckState::Success,
                    "failure" | "error" => CheckState::Failure,
                    _ => CheckState::Pending,
                },
                context: s.context,
            })
            .collect())
    }

    /// Check runs, used by GitHub Actions
    async fn check_runs(&self, repo: &RepoId, git_ref: &str) -> Result<Vec<StatusCheck>> {
        #[derive(Deserialize)]
        struct CheckRunsResponse {
            #[serde(default)]
            check_runs: Vec<CheckRun>,
        }

        #[derive(Deserialize)]
        struct CheckRun {
            name: String,
            status: String,
            conclusion: Option<String>,
        }

        let path = format!(
            "/repos/{}/{}/commits/{}/check-runs",
            repo.owner,
            repo.repo,
            urlencoding::encode(git_ref)
        );
        let response: CheckRunsResponse = match self.get_json(&path).await {
            Err(e) if e.status() == Some(404) => return Ok(Vec::new()),
            other => other?,
        };

        Ok(response
            .check_runs
            .into_iter()
            .map(|run| StatusCheck {
                state: if run.status == "completed" {
                    match run.conclusion.as_deref() {
                        Some("success" | "neutral") => CheckState::Success,
                        Some("skipped") => CheckState::Skipped,
                        // failure, cancelled, timed_out, action_required, or no conclusion
                        _ => CheckState::Failure,
                    }
                } else {
                    CheckState::Pending
                },
                context: run.name,
            })
            .collect())
    }

    /// Best-effort head branch deletion after a merge
    async fn delete_branch(&self, repo: &RepoId, branch: &str) {
        let url = format!(
            "{}/repos/{}/{}/git/refs/heads/{}",
            self.base_url, repo.owner, repo.repo, branch
        );
        let result = async {
            let token = self.get_token().await?;
            let response = self
                .http_client
                .delete(&url)
                .bearer_auth(token)
                .header("Accept", "application/vnd.github+json")
                .send()
                .await?;
            ensure_success(Platform::GitHub, response).await.map(drop)
        }
        .await;

        match result {
            Ok(()) => debug!(%repo, branch, "deleted head branch"),
            Err(e) => warn!(%repo, branch, error = %e, "failed to delete head branch after merge"),
        }
    }
}

fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    let state = match pr.state {
        Some(octocrab::models::IssueState::Open) => PrState::Open,
        _ if pr.merged_at.is_some() => PrState::Merged,
        // IssueState is non-exhaustive
        Some(_) | None => PrState::Closed,
    };

    PullRequest {
        number: pr.number,
        url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        title: pr.title.clone().unwrap_or_default(),
        body: pr.body.clone().unwrap_or_default(),
        state,
        is_draft: pr.draft.unwrap_or(false),
        mergeable: pr.mergeable,
        head_ref: pr.head.ref_field.clone(),
        head_sha: pr.head.sha.clone(),
        base_ref: pr.base.ref_field.clone(),
    }
}

const fn octocrab_method(method: MergeMethod) -> octocrab::params::pulls::MergeMethod {
    match method {
        MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
        MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
        MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
    }
}

fn ref_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequestRef {
    PullRequestRef {
        number: pr.number,
        url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    async fn get_token(&self) -> Result<String> {
        self.token
            .get_or_try_init(|| async {
                get_github_auth(self.host.as_deref())
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
        debug!(%repo, head, base, draft, "creating PR");
        let pr = with_retry(&self.retry, || async move {
            self.client()
                .await?
                .pulls(&repo.owner, &repo.repo)
                .create(title, head, base)
                .body(body)
                .draft(draft)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;

        debug!(%repo, pr_number = pr.number, "created PR");
        Ok(ref_from_octocrab(&pr))
    }

    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequest> {
        debug!(%repo, pr_number = number, "getting PR");
        let pr = with_retry(&self.retry, || async move {
            self.client()
                .await?
                .pulls(&repo.owner, &repo.repo)
                .get(number)
                .await
                .map_err(Error::from)
        })
        .await?;

        let pr = pr_from_octocrab(&pr);
        debug!(%repo, pr_number = number, state = %pr.state, "got PR");
        Ok(pr)
    }

    async fn update_pull_request_body(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<()> {
        debug!(%repo, pr_number = number, "updating PR body");
        with_retry(&self.retry, || async move {
            self.client()
                .await?
                .pulls(&repo.owner, &repo.repo)
                .update(number)
                .body(body)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;
        Ok(())
    }

    async fn find_pr_by_branch(
        &self,
        repo: &RepoId,
        branch: &str,
    ) -> Result<Option<PullRequestRef>> {
        debug!(%repo, branch, "finding existing PR");
        let head = format!("{}:{branch}", repo.owner);
        let head = head.as_str();
        let prs = with_retry(&self.retry, || async move {
            self.client()
                .await?
                .pulls(&repo.owner, &repo.repo)
                .list()
                .head(head)
                .state(octocrab::params::State::Open)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;

        let result = prs.items.first().map(ref_from_octocrab);
        match &result {
            Some(pr) => debug!(%repo, pr_number = pr.number, "found existing PR"),
            None => debug!(%repo, "no existing PR found"),
        }
        Ok(result)
    }

    async fn is_pull_request_approved(&self, repo: &RepoId, number: u64) -> Result<bool> {
        let reviews = self.get_pull_request_reviews(repo, number).await?;
        let approved = approval_from_reviews(&reviews);
        debug!(%repo, pr_number = number, approved, "checked approval");
        Ok(approved)
    }

    async fn get_pull_request_reviews(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<PrReview>> {
        use octocrab::models::pulls::ReviewState as GhReviewState;

        debug!(%repo, pr_number = number, "listing reviews");
        let page = with_retry(&self.retry, || async move {
            self.client()
                .await?
                .pulls(&repo.owner, &repo.repo)
                .list_reviews(number)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;

        Ok(page
            .items
            .into_iter()
            .map(|r| PrReview {
                user: r.user.map(|u| u.login).unwrap_or_default(),
                state: match r.state {
                    Some(GhReviewState::Approved) => ReviewState::Approved,
                    Some(GhReviewState::ChangesRequested) => ReviewState::ChangesRequested,
                    Some(GhReviewState::Commented) => ReviewState::Commented,
                    _ => ReviewState::Pending,
                },
                submitted_at: r.submitted_at,
            })
            .collect())
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        debug!(%repo, pr_number = number, method = %options.method, "merging PR");

        // Squash needs title/body; deletion needs the head ref
        let details = self.get_pull_request(repo, number).await?;
        let squash_title = format!("{} (#{number})", details.title);
        let (squash_title, body) = (squash_title.as_str(), details.body.as_str());
        let method = options.method;

        let outcome = with_retry(&self.retry, || async move {
            let client = self.client().await?;
            let pulls = client.pulls(&repo.owner, &repo.repo);
            let builder = pulls.merge(number).method(octocrab_method(method));
            let sent = if method == MergeMethod::Squash {
                builder.title(squash_title).message(body).send().await
            } else {
                builder.send().await
            };
            sent.map_err(Error::from)
        })
        .await;

        let commit = match outcome {
            Ok(commit) => commit,
            Err(e) => {
                debug!(%repo, pr_number = number, error = %e, "merge declined or failed");
                return declined_merge(e, &DECLINED_MERGE);
            }
        };

        let result = MergeResult {
            merged: commit.merged,
            sha: commit.sha,
            message: commit.message,
        };
        if result.merged && options.delete_branch {
            self.delete_branch(repo, &details.head_ref).await;
        }

        debug!(%repo, pr_number = number, merged = result.merged, sha = ?result.sha, "merge complete");
        Ok(result)
    }

    async fn get_status_checks(&self, repo: &RepoId, git_ref: &str) -> Result<StatusCheckResult> {
        debug!(%repo, git_ref, "getting status checks");
        let (mut statuses, runs) =
            tokio::try_join!(self.commit_statuses(repo, git_ref), self.check_runs(repo, git_ref))?;
        statuses.extend(runs);

        let result = aggregate_status(statuses);
        debug!(%repo, git_ref, state = ?result.state, count = result.statuses.len(), "got status checks");
        Ok(result)
    }

    async fn get_allowed_merge_methods(
        &self,
        repo: &RepoId,
    ) -> Result<Option<AllowedMergeMethods>> {
        #[derive(Deserialize)]
        #[allow(clippy::struct_field_names)]
        struct RepoSettings {
            allow_merge_commit: Option<bool>,
            allow_squash_merge: Option<bool>,
            allow_rebase_merge: Option<bool>,
        }

        debug!(%repo, "getting allowed merge methods");
        let settings: RepoSettings = self
            .get_json(&format!("/repos/{}/{}", repo.owner, repo.repo))
            .await?;

        // Fields are omitted for tokens without admin scope; GitHub's default allows all
        Ok(Some(AllowedMergeMethods {
            merge: settings.allow_merge_commit.unwrap_or(true),
            squash: settings.allow_squash_merge.unwrap_or(true),
            rebase: settings.allow_rebase_merge.unwrap_or(true),
        }))
    }

    fn parse_repo_url(&self, url: &str) -> Option<RepoCoordinates> {
        parse_github_url(url)
    }
}
