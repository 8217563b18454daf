//! Azure DevOps platform service implementation
//!
//! Repositories live under `{org}/{project}/_git/{repo}`; every REST call is
//! scoped the same way and pinned to `api-version=7.1`.

use crate::auth::{AuthSource, AuthToken, get_azure_auth};
use crate::error::{Error, Result};
use crate::platform::detection::parse_azure_url;
use crate::platform::http::{client, declined_merge, read_json};
use crate::platform::{PlatformService, RepoId, aggregate_status};
use crate::retry::{RetryOptions, with_retry};
use crate::types::{
    CheckState, MergeMethod, MergeOptions, MergeResult, Platform, PrReview, PrState, PullRequest,
    PullRequestRef, RepoCoordinates, ReviewState, StatusCheck, StatusCheckResult,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

const API_VERSION: &str = "api-version=7.1";

/// Statuses Azure DevOps uses to refuse a completion
const DECLINED_MERGE: [u16; 4] = [400, 405, 409, 422];

/// Re-reads of a PR whose completion was queued rather than finished
const COMPLETION_POLLS: u32 = 10;
const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Vote values a reviewer can cast
const VOTE_APPROVED: i32 = 10;
const VOTE_APPROVED_WITH_SUGGESTIONS: i32 = 5;
const VOTE_REJECTED: i32 = -10;

/// Azure DevOps service using reqwest
pub struct AzureDevOpsService {
    client: Client,
    /// Organization root, e.g. `https://dev.azure.com`
    base_url: String,
    retry: RetryOptions,
    auth: OnceCell<AuthToken>,
    poll_interval: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzurePullRequest {
    pull_request_id: u64,
    #[serde(default)]
    title: String,
    description: Option<String>,
    status: String, // "active", "completed", "abandoned"
    #[serde(default)]
    is_draft: bool,
    merge_status: Option<String>,
    #[serde(default)]
    source_ref_name: String,
    #[serde(default)]
    target_ref_name: String,
    last_merge_source_commit: Option<CommitRef>,
    last_merge_commit: Option<CommitRef>,
    merge_failure_message: Option<String>,
    #[serde(default)]
    reviewers: Vec<Reviewer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitRef {
    commit_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reviewer {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    vote: i32,
}

#[derive(Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
struct CommitStatus {
    state: String,
    context: Option<StatusContext>,
}

#[derive(Deserialize)]
struct StatusContext {
    name: String,
    genre: Option<String>,
}

fn strip_heads(name: &str) -> String {
    name.strip_prefix("refs/heads/").unwrap_or(name).to_string()
}

fn pr_state(status: &str) -> PrState {
    match status {
        "active" => PrState::Open,
        "completed" => PrState::Merged,
        _ => PrState::Closed,
    }
}

fn mergeable(merge_status: Option<&str>) -> Option<bool> {
    match merge_status {
        Some("succeeded") => Some(true),
        Some("conflicts" | "failure" | "rejectedByPolicy") => Some(false),
        // notSet, queued
        _ => None,
    }
}

fn review_state(vote: i32) -> ReviewState {
    match vote {
        VOTE_APPROVED | VOTE_APPROVED_WITH_SUGGESTIONS => ReviewState::Approved,
        VOTE_REJECTED => ReviewState::ChangesRequested,
        _ => ReviewState::Pending,
    }
}

/// Approved iff some vote is at least "approved with suggestions" and none rejects
fn approved_by_votes(reviewers: &[Reviewer]) -> bool {
    reviewers.iter().any(|r| r.vote >= VOTE_APPROVED_WITH_SUGGESTIONS)
        && !reviewers.iter().any(|r| r.vote == VOTE_REJECTED)
}

fn check_state(state: &str) -> CheckState {
    match state {
        "succeeded" => CheckState::Success,
        "failed" | "error" => CheckState::Failure,
        "notApplicable" => CheckState::Skipped,
        // notSet, pending
        _ => CheckState::Pending,
    }
}

const fn merge_strategy(method: MergeMethod) -> &'static str {
    match method {
        MergeMethod::Squash => "squash",
        MergeMethod::Merge => "noFastForward",
        MergeMethod::Rebase => "rebase",
    }
}

impl AzureDevOpsService {
    /// Create a service for the organization root at `base_url`
    pub fn new(base_url: &str, retry: RetryOptions) -> Result<Self> {
        Ok(Self {
            client: client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            auth: OnceCell::new(),
            poll_interval: COMPLETION_POLL_INTERVAL,
        })
    }

    /// Create a service with a fixed personal access token
    pub fn with_token(base_url: &str, token: &str, retry: RetryOptions) -> Result<Self> {
        let mut service = Self::new(base_url, retry)?;
        service.auth = OnceCell::from(AuthToken {
            token: token.to_string(),
            source: AuthSource::EnvVar,
        });
        Ok(service)
    }

    async fn auth(&self) -> Result<&AuthToken> {
        self.auth.get_or_try_init(get_azure_auth).await
    }

    /// `Authorization` header value: PATs use basic auth, `az` tokens are bearer tokens
    async fn authorization(&self) -> Result<String> {
        let auth = self.auth().await?;
        Ok(match auth.source {
            AuthSource::EnvVar => {
                format!("Basic {}", STANDARD.encode(format!(":{}", auth.token)))
            }
            AuthSource::Cli => format!("Bearer {}", auth.token),
        })
    }

    fn project<'a>(repo: &'a RepoId) -> Result<&'a str> {
        repo.project.as_deref().ok_or_else(|| {
            Error::Config(format!("Azure DevOps repository {repo} has no project"))
        })
    }

    /// REST URL under the repository, `rest` may carry its own query string
    fn repo_url(&self, repo: &RepoId, rest: &str) -> Result<String> {
        let project = Self::project(repo)?;
        let separator = if rest.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{}/{}/{}/_apis/git/repositories/{}{rest}{separator}{API_VERSION}",
            self.base_url,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(project),
            urlencoding::encode(&repo.repo),
        ))
    }

    /// Browser URL of a pull request
    fn web_url(&self, repo: &RepoId, number: u64) -> String {
        format!(
            "{}/{}/{}/_git/{}/pullrequest/{number}",
            self.base_url,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(repo.project.as_deref().unwrap_or_default()),
            urlencoding::encode(&repo.repo),
        )
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let method = &method;
        with_retry(&self.retry, || async move {
            let authorization = self.authorization().await?;
            let mut request = self
                .client
                .request(method.clone(), url)
                .header("Authorization", authorization);
            if let Some(body) = body {
                request = request.json(body);
            }
            read_json(Platform::AzureDevOps, request.send().await?).await
        })
        .await
    }

    async fn fetch(&self, repo: &RepoId, number: u64) -> Result<AzurePullRequest> {
        let url = self.repo_url(repo, &format!("/pullrequests/{number}"))?;
        self.request(Method::GET, &url, None).await
    }

    /// Re-read a PR until its queued completion finishes or fails
    async fn await_completion(
        &self,
        repo: &RepoId,
        number: u64,
        mut pr: AzurePullRequest,
    ) -> Result<AzurePullRequest> {
        for _ in 0..COMPLETION_POLLS {
            if pr.status != "active" || mergeable(pr.merge_status.as_deref()) == Some(false) {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
            pr = self.fetch(repo, number).await?;
        }
        Ok(pr)
    }
}

/// Only a completed PR is merged; anything else is reported as declined
fn completion_result(pr: AzurePullRequest) -> MergeResult {
    match pr.status.as_str() {
        "completed" => MergeResult {
            merged: true,
            sha: pr.last_merge_commit.map(|c| c.commit_id),
            message: None,
        },
        "active" => MergeResult::rejected(format!(
            "completion did not finish (mergeStatus: {}){}",
            pr.merge_status.as_deref().unwrap_or("notSet"),
            pr.merge_failure_message
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        )),
        status => MergeResult::rejected(format!("pull request is {status}")),
    }
}

#[async_trait]
impl PlatformService for AzureDevOpsService {
    fn platform(&self) -> Platform {
        Platform::AzureDevOps
    }

    async fn get_token(&self) -> Result<String> {
        Ok(self.auth().await?.token.clone())
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
        let url = self.repo_url(repo, "/pullrequests")?;
        let payload = json!({
            "sourceRefName": format!("refs/heads/{head}"),
            "targetRefName": format!("refs/heads/{base}"),
            "title": title,
            "description": body,
            "isDraft": draft,
        });
        let pr: AzurePullRequest = self.request(Method::POST, &url, Some(&payload)).await?;

        debug!(%repo, pr_number = pr.pull_request_id, "created PR");
        Ok(PullRequestRef {
            number: pr.pull_request_id,
            url: self.web_url(repo, pr.pull_request_id),
        })
    }

    async fn get_pull_request(&self, repo: &RepoId, number: u64) -> Result<PullRequest> {
        debug!(%repo, pr_number = number, "getting PR");
        let pr = self.fetch(repo, number).await?;

        let result = PullRequest {
            number: pr.pull_request_id,
            url: self.web_url(repo, pr.pull_request_id),
            title: pr.title,
            body: pr.description.unwrap_or_default(),
            state: pr_state(&pr.status),
            is_draft: pr.is_draft,
            mergeable: mergeable(pr.merge_status.as_deref()),
            head_ref: strip_heads(&pr.source_ref_name),
            head_sha: pr
                .last_merge_source_commit
                .map(|c| c.commit_id)
                .unwrap_or_default(),
            base_ref: strip_heads(&pr.target_ref_name),
        };
        debug!(%repo, pr_number = number, state = %result.state, "got PR");
        Ok(result)
    }

    async fn update_pull_request_body(
        &self,
        repo: &RepoId,
        number: u64,
        body: &str,
    ) -> Result<()> {
        debug!(%repo, pr_number = number, "updating PR description");
        let url = self.repo_url(repo, &format!("/pullrequests/{number}"))?;
        let payload = json!({ "description": body });
        let _: Value = self.request(Method::PATCH, &url, Some(&payload)).await?;
        Ok(())
    }

    async fn find_pr_by_branch(
        &self,
        repo: &RepoId,
        branch: &str,
    ) -> Result<Option<PullRequestRef>> {
        debug!(%repo, branch, "finding existing PR");
        let source = format!("refs/heads/{branch}");
        let url = self.repo_url(
            repo,
            &format!(
                "/pullrequests?searchCriteria.sourceRefName={}&searchCriteria.status=active",
                urlencoding::encode(&source)
            ),
        )?;
        let list: ValueList<AzurePullRequest> = self.request(Method::GET, &url, None).await?;

        let result = list.value.first().map(|pr| PullRequestRef {
            number: pr.pull_request_id,
            url: self.web_url(repo, pr.pull_request_id),
        });
        match &result {
            Some(pr) => debug!(%repo, pr_number = pr.number, "found existing PR"),
            None => debug!(%repo, "no existing PR found"),
        }
        Ok(result)
    }

    async fn is_pull_request_approved(&self, repo: &RepoId, number: u64) -> Result<bool> {
        let pr = self.fetch(repo, number).await?;
        let approved = approved_by_votes(&pr.reviewers);
        debug!(%repo, pr_number = number, approved, "checked approval");
        Ok(approved)
    }

    async fn get_pull_request_reviews(
        &self,
        repo: &RepoId,
        number: u64,
    ) -> Result<Vec<PrReview>> {
        debug!(%repo, pr_number = number, "listing reviewers");
        let pr = self.fetch(repo, number).await?;
        Ok(pr
            .reviewers
            .into_iter()
            .map(|r| PrReview {
                state: review_state(r.vote),
                user: r.display_name,
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
        debug!(%repo, pr_number = number, method = %options.method, "completing PR");

        // Completion must name the source commit it was reviewed at
        let pr = self.fetch(repo, number).await?;
        let commit_id = pr
            .last_merge_source_commit
            .map(|c| c.commit_id)
            .ok_or_else(|| {
                Error::MalformedResponse(format!("PR {number} in {repo} has no source commit"))
            })?;

        let url = self.repo_url(repo, &format!("/pullrequests/{number}"))?;
        let payload = json!({
            "status": "completed",
            "lastMergeSourceCommit": { "commitId": commit_id },
            "completionOptions": {
                "mergeStrategy": merge_strategy(options.method),
                "deleteSourceBranch": options.delete_branch,
            },
        });

        let response: AzurePullRequest =
            match self.request(Method::PATCH, &url, Some(&payload)).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(%repo, pr_number = number, error = %e, "completion declined or failed");
                    return declined_merge(e, &DECLINED_MERGE);
                }
            };

        // Completion is asynchronous; a queued merge can still fail on conflicts or policy
        let pr = self.await_completion(repo, number, response).await?;
        let result = completion_result(pr);
        debug!(%repo, pr_number = number, merged = result.merged, "completion finished");
        Ok(result)
    }

    async fn get_status_checks(&self, repo: &RepoId, git_ref: &str) -> Result<StatusCheckResult> {
        debug!(%repo, git_ref, "getting commit statuses");
        let url = self.repo_url(
            repo,
            &format!("/commits/{}/statuses", urlencoding::encode(git_ref)),
        )?;
        let list: ValueList<CommitStatus> = match self.request(Method::GET, &url, None).await {
            Err(e) if e.status() == Some(404) => ValueList { value: Vec::new() },
            other => other?,
        };

        let result = aggregate_status(
            list.value
                .into_iter()
                .map(|s| StatusCheck {
                    state: check_state(&s.state),
                    context: s
                        .context
                        .map(|c| match c.genre {
                            Some(genre) => format!("{genre}/{}", c.name),
                            None => c.name,
                        })
                        .unwrap_or_default(),
                })
                .collect(),
        );
        debug!(%repo, git_ref, state = ?result.state, "got commit statuses");
        Ok(result)
    }

    fn parse_repo_url(&self, url: &str) -> Option<RepoCoordinates> {
        parse_azure_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    const PR_PATH: &str = "/contoso/web/_apis/git/repositories/portal/pullrequests/42";

    fn service(server: &Server) -> AzureDevOpsService {
        let mut svc =
            AzureDevOpsService::with_token(&server.url(), "pat", RetryOptions::no_retry()).unwrap();
        svc.poll_interval = Duration::ZERO;
        svc
    }

    fn squash() -> MergeOptions {
        MergeOptions {
            method: MergeMethod::Squash,
            delete_branch: false,
        }
    }

    /// Serve `pr_body` for every GET of the PR and `completion` for the PATCH
    async fn completion_server(pr_body: &str, status: usize, completion: &str) -> ServerGuard {
        let mut server = Server::new_async().await;
        server
            .mock("GET", PR_PATH)
            .match_query(Matcher::Any)
            .with_body(pr_body)
            .create_async()
            .await;
        server
            .mock("PATCH", PR_PATH)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(completion)
            .create_async()
            .await;
        server
    }

    const ACTIVE_PR: &str =
        r#"{"pullRequestId":42,"status":"active","mergeStatus":"queued","lastMergeSourceCommit":{"commitId":"c0ffee"}}"#;
    const QUEUED: &str = r#"{"pullRequestId":42,"status":"active","completionQueueTime":"2026-01-01T00:00:00Z","mergeStatus":"queued"}"#;

    fn repo() -> RepoId {
        RepoId::new("contoso", "portal").with_project("web")
    }

    fn reviewer(vote: i32) -> Reviewer {
        Reviewer {
            display_name: format!("r{vote}"),
            vote,
        }
    }

    #[test]
    fn test_vote_rule() {
        assert!(!approved_by_votes(&[]));
        assert!(approved_by_votes(&[reviewer(10)]));
        assert!(approved_by_votes(&[reviewer(5), reviewer(0)]));
        assert!(!approved_by_votes(&[reviewer(10), reviewer(-10)]));
        assert!(!approved_by_votes(&[reviewer(-5)]));
    }

    #[test]
    fn test_repo_url_requires_project() {
        let svc = AzureDevOpsService::new("https://dev.azure.com", RetryOptions::no_retry()).unwrap();
        assert!(matches!(
            svc.repo_url(&RepoId::new("contoso", "portal"), "/pullrequests"),
            Err(Error::Config(_))
        ));
        assert_eq!(
            svc.repo_url(&RepoId::new("contoso", "portal").with_project("Web Apps"), "/pullrequests")
                .unwrap(),
            "https://dev.azure.com/contoso/Web%20Apps/_apis/git/repositories/portal/pullrequests?api-version=7.1"
        );
    }

    #[tokio::test]
    async fn test_get_pull_request_normalizes_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", PR_PATH)
            .match_query(Matcher::UrlEncoded("api-version".into(), "7.1".into()))
            .match_header("authorization", "Basic OnBhdA==")
            .with_body(
                r#"{"pullRequestId":42,"title":"Add login","description":"desc","status":"completed",
                    "isDraft":false,"mergeStatus":"succeeded","sourceRefName":"refs/heads/feat/login",
                    "targetRefName":"refs/heads/main","lastMergeSourceCommit":{"commitId":"c0ffee"},
                    "reviewers":[{"displayName":"Ann","vote":10}]}"#,
            )
            .create_async()
            .await;

        let pr = service(&server).get_pull_request(&repo(), 42).await.unwrap();
        mock.assert_async().await;
        assert_eq!(pr.state, PrState::Merged);
        assert_eq!(pr.mergeable, Some(true));
        assert_eq!(pr.head_ref, "feat/login");
        assert_eq!(pr.base_ref, "main");
        assert_eq!(pr.head_sha, "c0ffee");
        assert!(pr.url.ends_with("/contoso/web/_git/portal/pullrequest/42"));
    }

    #[tokio::test]
    async fn test_approval_and_reviews() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", PR_PATH)
            .match_query(Matcher::Any)
            .with_body(
                r#"{"pullRequestId":42,"status":"active",
                    "reviewers":[{"displayName":"Ann","vote":5},{"displayName":"Bob","vote":-10}]}"#,
            )
            .create_async()
            .await;

        let svc = service(&server);
        assert!(!svc.is_pull_request_approved(&repo(), 42).await.unwrap());
        let reviews = svc.get_pull_request_reviews(&repo(), 42).await.unwrap();
        assert_eq!(reviews[0].state, ReviewState::Approved);
        assert_eq!(reviews[1].state, ReviewState::ChangesRequested);
    }

    #[tokio::test]
    async fn test_find_by_branch() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/contoso/web/_apis/git/repositories/portal/pullrequests")
            .match_query(Matcher::Any)
            .with_body(r#"{"value":[{"pullRequestId":7,"status":"active"}],"count":1}"#)
            .create_async()
            .await;

        let found = service(&server)
            .find_pr_by_branch(&repo(), "feat")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.number, 7);
    }

    #[tokio::test]
    async fn test_merge_completes_with_strategy() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", PR_PATH)
            .match_query(Matcher::Any)
            .with_body(
                r#"{"pullRequestId":42,"status":"active","lastMergeSourceCommit":{"commitId":"c0ffee"}}"#,
            )
            .create_async()
            .await;
        let complete = server
            .mock("PATCH", PR_PATH)
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "status": "completed",
                "lastMergeSourceCommit": { "commitId": "c0ffee" },
                "completionOptions": { "mergeStrategy": "rebase", "deleteSourceBranch": true },
            })))
            .with_body(r#"{"pullRequestId":42,"status":"completed","lastMergeCommit":{"commitId":"abc"}}"#)
            .create_async()
            .await;

        let options = MergeOptions {
            method: MergeMethod::Rebase,
            delete_branch: true,
        };
        let result = service(&server)
            .merge_pull_request(&repo(), 42, &options)
            .await
            .unwrap();
        complete.assert_async().await;
        assert!(result.merged);
        assert_eq!(result.sha.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_policy_rejection_is_not_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", PR_PATH)
            .match_query(Matcher::Any)
            .with_body(
                r#"{"pullRequestId":42,"status":"active","lastMergeSourceCommit":{"commitId":"c0ffee"}}"#,
            )
            .create_async()
            .await;
        server
            .mock("PATCH", PR_PATH)
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"message":"TF401027: policy requires approval"}"#)
            .create_async()
            .await;

        let options = MergeOptions {
            method: MergeMethod::Squash,
            delete_branch: false,
        };
        let result = service(&server)
            .merge_pull_request(&repo(), 42, &options)
            .await
            .unwrap();
        assert!(!result.merged);
        assert!(result.message.unwrap().starts_with("HTTP 409"));
    }

    #[tokio::test]
    async fn test_queued_completion_that_never_finishes_is_not_merged() {
        let server = completion_server(ACTIVE_PR, 200, QUEUED).await;

        let result = service(&server)
            .merge_pull_request(&repo(), 42, &squash())
            .await
            .unwrap();
        assert!(!result.merged);
        assert!(result.sha.is_none());
        assert!(result.message.unwrap().contains("queued"));
    }

    #[tokio::test]
    async fn test_queued_completion_that_finishes_is_merged() {
        let completed = r#"{"pullRequestId":42,"status":"completed","lastMergeSourceCommit":{"commitId":"c0ffee"},
                            "lastMergeCommit":{"commitId":"m1"}}"#;
        let server = completion_server(completed, 200, QUEUED).await;

        let result = service(&server)
            .merge_pull_request(&repo(), 42, &squash())
            .await
            .unwrap();
        assert!(result.merged);
        assert_eq!(result.sha.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_queued_completion_hitting_conflicts_is_declined() {
        let conflicted = r#"{"pullRequestId":42,"status":"active","mergeStatus":"conflicts",
                             "mergeFailureMessage":"merge conflicts in src/app.ts",
                             "lastMergeSourceCommit":{"commitId":"c0ffee"}}"#;
        let server = completion_server(conflicted, 200, QUEUED).await;

        let result = service(&server)
            .merge_pull_request(&repo(), 42, &squash())
            .await
            .unwrap();
        assert!(!result.merged);
        let message = result.message.unwrap();
        assert!(message.contains("conflicts"));
        assert!(message.contains("src/app.ts"));
    }

    #[tokio::test]
    async fn test_strategy_refusal_is_declined() {
        let server = completion_server(
            ACTIVE_PR,
            405,
            r#"{"message":"The merge strategy squash is not allowed by policy"}"#,
        )
        .await;

        let result = service(&server)
            .merge_pull_request(&repo(), 42, &squash())
            .await
            .unwrap();
        assert!(!result.merged);
        let message = result.message.unwrap();
        assert!(message.starts_with("HTTP 405"));
        assert!(service(&server).is_method_rejection(&message));
    }

    #[tokio::test]
    async fn test_permission_failure_is_an_error() {
        let server = completion_server(
            ACTIVE_PR,
            403,
            r#"{"message":"TF401027: You need the Git 'PullRequestContribute' permission"}"#,
        )
        .await;

        let err = service(&server)
            .merge_pull_request(&repo(), 42, &squash())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn test_status_checks() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/contoso/web/_apis/git/repositories/portal/commits/c0ffee/statuses")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"value":[{"state":"succeeded","context":{"name":"build","genre":"ci"}},
                             {"state":"failed","context":{"name":"tests"}}]}"#,
            )
            .create_async()
            .await;

        let result = service(&server).get_status_checks(&repo(), "c0ffee").await.unwrap();
        assert_eq!(result.state, CheckState::Failure);
        assert_eq!(result.statuses[0].context, "ci/build");
    }

    #[tokio::test]
    async fn test_no_allowed_methods_query() {
        let svc = AzureDevOpsService::new("https://dev.azure.com", RetryOptions::no_retry()).unwrap();
        assert!(svc.get_allowed_merge_methods(&repo()).await.unwrap().is_none());
    }
}
