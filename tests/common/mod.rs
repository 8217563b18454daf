//! Shared fixtures for integration tests

#![allow(dead_code)]

mod mock_platform;

pub use mock_platform::{
    CreatePrCall, MergeCall, MockPlatformService, UpdateBodyCall, make_pr,
};

use async_trait::async_trait;
use codi_repo::error::Result;
use codi_repo::git::GitOps;
use codi_repo::manifest::{MANIFEST_REPO_NAME, Settings, Workspace};
use codi_repo::platform::{PlatformRegistry, PlatformService, default_api_base};
use codi_repo::retry::RetryOptions;
use codi_repo::types::{Platform, RepoInfo};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A GitHub repository `acme/<name>` cloned at `<root>/<name>`
pub fn github_repo(root: &Path, name: &str) -> RepoInfo {
    RepoInfo {
        name: name.to_string(),
        url: format!("https://github.com/acme/{name}.git"),
        path: root.join(name),
        default_branch: "main".to_string(),
        owner: "acme".to_string(),
        repo: name.to_string(),
        project: None,
        platform: Platform::GitHub,
        host: "github.com".to_string(),
    }
}

/// A GitLab repository `acme/<name>` cloned at `<root>/<name>`
pub fn gitlab_repo(root: &Path, name: &str) -> RepoInfo {
    RepoInfo {
        url: format!("https://gitlab.com/acme/{name}.git"),
        platform: Platform::GitLab,
        host: "gitlab.com".to_string(),
        ..github_repo(root, name)
    }
}

/// An Azure DevOps repository `acme/platform/_git/<name>` cloned at `<root>/<name>`
pub fn azure_repo(root: &Path, name: &str) -> RepoInfo {
    RepoInfo {
        url: format!("https://dev.azure.com/acme/platform/_git/{name}"),
        project: Some("platform".to_string()),
        platform: Platform::AzureDevOps,
        host: "dev.azure.com".to_string(),
        ..github_repo(root, name)
    }
}

/// The manifest repository `acme/workspace` at `root`
pub fn manifest_repo(root: &Path) -> RepoInfo {
    RepoInfo {
        name: MANIFEST_REPO_NAME.to_string(),
        url: "https://github.com/acme/workspace.git".to_string(),
        path: root.to_path_buf(),
        repo: "workspace".to_string(),
        ..github_repo(root, "workspace")
    }
}

/// Workspace over `repos`, with a GitHub manifest repository if `manifest`
pub fn workspace(root: &Path, repos: Vec<RepoInfo>, manifest: bool) -> Workspace {
    Workspace {
        root: root.to_path_buf(),
        repos,
        manifest: manifest.then(|| manifest_repo(root)),
        settings: Settings::default(),
    }
}

/// Registry answering every GitHub.com call with `mock`
pub fn github_registry(mock: &Arc<MockPlatformService>) -> PlatformRegistry {
    let registry = PlatformRegistry::new(RetryOptions::no_retry());
    let service: Arc<dyn PlatformService> = mock.clone();
    registry.register(
        Platform::GitHub,
        &default_api_base(Platform::GitHub, "github.com"),
        service,
    );
    registry
}

/// Register `mock` for GitLab.com too
pub fn add_gitlab(registry: &PlatformRegistry, mock: &Arc<MockPlatformService>) {
    let service: Arc<dyn PlatformService> = mock.clone();
    registry.register(
        Platform::GitLab,
        &default_api_base(Platform::GitLab, "gitlab.com"),
        service,
    );
}

/// Register `mock` for Azure DevOps too
pub fn add_azure(registry: &PlatformRegistry, mock: &Arc<MockPlatformService>) {
    let service: Arc<dyn PlatformService> = mock.clone();
    registry.register(
        Platform::AzureDevOps,
        &default_api_base(Platform::AzureDevOps, "dev.azure.com"),
        service,
    );
}

/// In-memory [`GitOps`]: every path exists unless listed as missing
#[derive(Default)]
pub struct MockGit {
    branches: Mutex<HashMap<PathBuf, Vec<String>>>,
    missing_paths: Mutex<Vec<PathBuf>>,
    pushes: Mutex<Vec<(PathBuf, String)>>,
}

impl MockGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the clone at `path` a local `branch`
    pub fn add_branch(&self, path: &Path, branch: &str) {
        self.branches
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .push(branch.to_string());
    }

    /// Pretend the clone at `path` does not exist
    pub fn remove_path(&self, path: &Path) {
        self.missing_paths.lock().unwrap().push(path.to_path_buf());
    }

    /// Pushed `(path, branch)` pairs
    pub fn pushes(&self) -> Vec<(PathBuf, String)> {
        self.pushes.lock().unwrap().clone()
    }

    fn has_branch(&self, path: &Path, branch: &str) -> bool {
        self.branches
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|b| b.iter().any(|name| name == branch))
    }
}

#[async_trait]
impl GitOps for MockGit {
    async fn path_exists(&self, path: &Path) -> bool {
        !self.missing_paths.lock().unwrap().iter().any(|p| p == path)
    }

    async fn current_branch(&self, _path: &Path) -> Result<String> {
        Ok("main".to_string())
    }

    async fn has_commits_ahead(&self, _path: &Path, _base_branch: &str) -> Result<bool> {
        Ok(true)
    }

    async fn remote_branch_exists(&self, path: &Path, branch: &str) -> Result<bool> {
        Ok(self.has_branch(path, branch))
    }

    async fn push_branch(
        &self,
        path: &Path,
        branch: &str,
        _remote: &str,
        _set_upstream: bool,
    ) -> Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), branch.to_string()));
        Ok(())
    }

    async fn branch_exists(&self, path: &Path, branch: &str) -> Result<bool> {
        Ok(self.has_branch(path, branch))
    }
}
