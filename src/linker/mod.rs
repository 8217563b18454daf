//! Linked-PR discovery, creation and readiness
//!
//! One PR per repository shares a branch name; the manifest PR body lists
//! them in a hidden marker. The live body is the source of truth for which
//! PRs belong together; the state file only helps find the manifest PR.

mod body;

pub use body::{generate_manifest_pr_body, links_for, parse_linked_prs_from_body};

use crate::error::{Error, Result};
use crate::git::GitOps;
use crate::manifest::Workspace;
use crate::platform::{PlatformRegistry, RepoId};
use crate::tracking::{load_state, save_state};
use crate::types::{
    CheckState, LinkedPr, ManifestPr, Platform, PrState, PullRequestRef, RepoInfo,
};
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tracing::{debug, warn};

/// Options for [`Linker::create_linked_prs`]
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Title shared by every PR
    pub title: String,
    /// Body for the child PRs; also placed above the manifest table
    pub body: Option<String>,
    /// Open PRs as drafts
    pub draft: bool,
    /// Push the branch to `origin` before opening PRs
    pub push: bool,
}

/// What [`Linker::create_linked_prs`] did
#[derive(Debug, Clone)]
pub struct CreateReport {
    /// One entry per repository, in input order
    pub linked_prs: Vec<LinkedPr>,
    /// Repositories whose PR was newly created (others already had one)
    pub created: Vec<String>,
    /// The manifest PR, when a manifest repository is configured
    pub manifest_pr: Option<PullRequestRef>,
    /// Whether the manifest PR was newly created
    pub manifest_created: bool,
}

/// Which repositories have a branch locally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSync {
    /// Repositories with the branch
    pub present: Vec<String>,
    /// Repositories without the branch (or without a clone)
    pub missing: Vec<String>,
}

impl BranchSync {
    /// Whether every checked repository has the branch
    pub fn is_synced(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A branch's set of linked PRs as currently seen on the platforms
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum LinkedChange {
    /// Tied together by a manifest PR
    Manifest(ManifestPr),
    /// No manifest PR; children found by branch name
    #[serde(rename_all = "camelCase")]
    BranchOnly {
        /// Shared branch name
        branch: String,
        /// Open PRs for the branch, in workspace order
        linked_prs: Vec<LinkedPr>,
    },
}

impl LinkedChange {
    /// Child PRs in merge order
    pub fn linked_prs(&self) -> &[LinkedPr] {
        match self {
            Self::Manifest(manifest) => &manifest.linked_prs,
            Self::BranchOnly { linked_prs, .. } => linked_prs,
        }
    }

    /// The manifest PR, if any
    pub const fn manifest(&self) -> Option<&ManifestPr> {
        match self {
            Self::Manifest(manifest) => Some(manifest),
            Self::BranchOnly { .. } => None,
        }
    }

    /// Whether everything is ready to merge
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Manifest(manifest) => manifest.ready_to_merge,
            Self::BranchOnly { linked_prs, .. } => linked_prs.iter().all(LinkedPr::is_ready),
        }
    }
}

/// Platform for a link whose repository is gone, guessed from its sigil
const fn orphan_platform(sigil: char) -> Platform {
    if sigil == '!' {
        Platform::GitLab
    } else {
        Platform::GitHub
    }
}

/// Linked-PR operations over one workspace
pub struct Linker<'a> {
    workspace: &'a Workspace,
    registry: &'a PlatformRegistry,
    git: &'a dyn GitOps,
}

impl<'a> Linker<'a> {
    /// Create a linker
    pub fn new(
        workspace: &'a Workspace,
        registry: &'a PlatformRegistry,
        git: &'a dyn GitOps,
    ) -> Self {
        Self {
            workspace,
            registry,
            git,
        }
    }

    fn manifest_repo(&self) -> Result<&'a RepoInfo> {
        self.workspace
            .manifest
            .as_ref()
            .ok_or_else(|| Error::Config("no manifest repository configured".to_string()))
    }

    /// Fetch one PR with its approval and check state
    pub async fn get_linked_pr_info(&self, repo: &RepoInfo, number: u64) -> Result<LinkedPr> {
        let service = self.registry.for_repo(repo)?;
        let id = RepoId::from(repo);

        let pr = service.get_pull_request(&id, number).await?;
        let git_ref = if pr.head_sha.is_empty() {
            pr.head_ref.as_str()
        } else {
            pr.head_sha.as_str()
        };
        let (approved, checks) = tokio::try_join!(
            service.is_pull_request_approved(&id, number),
            service.get_status_checks(&id, git_ref),
        )?;

        debug!(
            repo = %repo.name,
            pr_number = number,
            state = %pr.state,
            approved,
            checks = ?checks.state,
            "fetched linked PR"
        );
        Ok(LinkedPr {
            repo_name: repo.name.clone(),
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            project: repo.project.clone(),
            platform: repo.platform,
            number,
            url: pr.url,
            state: pr.state,
            approved,
            checks_pass: checks.state == CheckState::Success,
            mergeable: pr.mergeable.unwrap_or(false),
            checks: Some(checks.summary()),
        })
    }

    /// Find or create the PR for `branch` in every repository of `repos`
    ///
    /// Repositories are handled concurrently. With a manifest repository
    /// configured, its PR is then created or its body refreshed, and the
    /// state file records it.
    pub async fn create_linked_prs(
        &self,
        repos: &[RepoInfo],
        branch: &str,
        options: &CreateOptions,
    ) -> Result<CreateReport> {
        let results = try_join_all(
            repos
                .iter()
                .map(|repo| self.ensure_child_pr(repo, branch, options)),
        )
        .await?;

        let mut linked_prs = Vec::with_capacity(results.len());
        let mut created = Vec::new();
        for (linked, was_created) in results {
            if was_created {
                created.push(linked.repo_name.clone());
            }
            linked_prs.push(linked);
        }

        let mut report = CreateReport {
            linked_prs,
            created,
            manifest_pr: None,
            manifest_created: false,
        };

        if let Some(manifest) = &self.workspace.manifest {
            let (pr, was_created) = self
                .ensure_manifest_pr(manifest, branch, options, &report.linked_prs)
                .await?;

            let mut state = load_state(&self.workspace.root)?;
            state.record(branch, pr.number, report.linked_prs.clone());
            save_state(&self.workspace.root, &state)?;

            report.manifest_pr = Some(pr);
            report.manifest_created = was_created;
        }

        Ok(report)
    }

    async fn ensure_child_pr(
        &self,
        repo: &RepoInfo,
        branch: &str,
        options: &CreateOptions,
    ) -> Result<(LinkedPr, bool)> {
        if options.push {
            self.git.push_branch(&repo.path, branch, "origin", true).await?;
        }

        let service = self.registry.for_repo(repo)?;
        let id = RepoId::from(repo);
        let (number, created) = match service.find_pr_by_branch(&id, branch).await? {
            Some(existing) => {
                debug!(repo = %repo.name, pr_number = existing.number, "reusing existing PR");
                (existing.number, false)
            }
            None => {
                let pr = service
                    .create_pull_request(
                        &id,
                        branch,
                        &repo.default_branch,
                        &options.title,
                        options.body.as_deref().unwrap_or_default(),
                        options.draft,
                    )
                    .await?;
                (pr.number, true)
            }
        };

        Ok((self.get_linked_pr_info(repo, number).await?, created))
    }

    async fn ensure_manifest_pr(
        &self,
        manifest: &RepoInfo,
        branch: &str,
        options: &CreateOptions,
        linked_prs: &[LinkedPr],
    ) -> Result<(PullRequestRef, bool)> {
        if options.push {
            self.git.push_branch(&manifest.path, branch, "origin", true).await?;
        }

        let service = self.registry.for_repo(manifest)?;
        let id = RepoId::from(manifest);
        let body = generate_manifest_pr_body(&options.title, linked_prs, options.body.as_deref());

        if let Some(existing) = service.find_pr_by_branch(&id, branch).await? {
            debug!(pr_number = existing.number, "refreshing manifest PR body");
            service
                .update_pull_request_body(&id, existing.number, &body)
                .await?;
            return Ok((existing, false));
        }

        let pr = service
            .create_pull_request(
                &id,
                branch,
                &manifest.default_branch,
                &options.title,
                &body,
                options.draft,
            )
            .await?;
        debug!(pr_number = pr.number, "created manifest PR");
        Ok((pr, true))
    }

    /// Re-derive a manifest PR and its children from the live PR body
    pub async fn get_manifest_pr_info(&self, number: u64) -> Result<ManifestPr> {
        let manifest = self.manifest_repo()?;
        let service = self.registry.for_repo(manifest)?;
        let pr = service
            .get_pull_request(&RepoId::from(manifest), number)
            .await?;

        let links = parse_linked_prs_from_body(&pr.body);
        debug!(pr_number = number, links = links.len(), "parsed manifest PR links");

        let linked_prs = try_join_all(links.iter().map(|link| async move {
            match self.workspace.repo(&link.repo_name) {
                Some(repo) => self.get_linked_pr_info(repo, link.number).await,
                None => {
                    warn!(repo = %link.repo_name, pr_number = link.number, "linked repository is not in the workspace");
                    Ok(LinkedPr::orphaned(
                        &link.repo_name,
                        link.number,
                        orphan_platform(link.sigil),
                    ))
                }
            }
        }))
        .await?;

        let ready_to_merge =
            pr.state == PrState::Open && linked_prs.iter().all(LinkedPr::is_ready);

        Ok(ManifestPr {
            repo_name: manifest.name.clone(),
            number: pr.number,
            url: pr.url,
            title: pr.title,
            state: pr.state,
            linked_prs,
            ready_to_merge,
        })
    }

    /// Open PRs for `branch` across every child repository
    pub async fn find_linked_prs_for_branch(&self, branch: &str) -> Result<Vec<LinkedPr>> {
        let found = try_join_all(self.workspace.repos.iter().map(|repo| async move {
            let service = self.registry.for_repo(repo)?;
            match service.find_pr_by_branch(&RepoId::from(repo), branch).await? {
                Some(pr) => self.get_linked_pr_info(repo, pr.number).await.map(Some),
                None => Ok(None),
            }
        }))
        .await?;

        Ok(found.into_iter().flatten().collect())
    }

    /// Manifest PR number for `branch`
    ///
    /// The live platform is asked first; the state file is only consulted
    /// when no open manifest PR is found.
    pub async fn locate_manifest_pr(&self, branch: &str) -> Result<Option<u64>> {
        let Some(manifest) = &self.workspace.manifest else {
            return Ok(None);
        };

        let service = self.registry.for_repo(manifest)?;
        if let Some(pr) = service
            .find_pr_by_branch(&RepoId::from(manifest), branch)
            .await?
        {
            return Ok(Some(pr.number));
        }

        let recorded = load_state(&self.workspace.root)?.manifest_pr_for(branch);
        if let Some(number) = recorded {
            debug!(branch, pr_number = number, "manifest PR found in state file");
        }
        Ok(recorded)
    }

    /// Current linked PRs for `branch`, via the manifest PR when there is one
    pub async fn get_linked_change(&self, branch: &str) -> Result<Option<LinkedChange>> {
        if let Some(number) = self.locate_manifest_pr(branch).await? {
            return self
                .get_manifest_pr_info(number)
                .await
                .map(|m| Some(LinkedChange::Manifest(m)));
        }

        let linked_prs = self.find_linked_prs_for_branch(branch).await?;
        if linked_prs.is_empty() {
            return Ok(None);
        }
        Ok(Some(LinkedChange::BranchOnly {
            branch: branch.to_string(),
            linked_prs,
        }))
    }

    /// Check which of `repos` have `branch` in their local clone
    pub async fn check_branch_sync(&self, repos: &[RepoInfo], branch: &str) -> BranchSync {
        let checks = join_all(repos.iter().map(|repo| async move {
            if !self.git.path_exists(&repo.path).await {
                return (repo.name.clone(), false);
            }
            match self.git.branch_exists(&repo.path, branch).await {
                Ok(exists) => (repo.name.clone(), exists),
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "could not check branch");
                    (repo.name.clone(), false)
                }
            }
        }))
        .await;

        let mut sync = BranchSync::default();
        for (name, exists) in checks {
            if exists {
                sync.present.push(name);
            } else {
                sync.missing.push(name);
            }
        }
        sync
    }
}
