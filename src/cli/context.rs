//! Shared command context for CLI commands
//!
//! Loads the workspace, builds the platform registry from its retry
//! settings and settles which branch the command operates on.

use codi_repo::error::{Error, Result};
use codi_repo::git::{GitCli, GitOps};
use codi_repo::linker::Linker;
use codi_repo::manifest::Workspace;
use codi_repo::platform::PlatformRegistry;
use std::path::Path;
use tracing::debug;

/// Shared context for the `pr` commands
pub struct CommandContext {
    /// Loaded workspace
    pub workspace: Workspace,
    /// Platform services for this run
    pub registry: PlatformRegistry,
    /// Local git access
    pub git: GitCli,
    /// Branch the linked change lives on
    pub branch: String,
}

impl CommandContext {
    /// Create a new command context
    ///
    /// `workspace` defaults to searching upward from the current directory.
    /// `branch` defaults to the checked-out branch of the manifest clone, or
    /// of the first child clone found on disk.
    pub async fn new(workspace: Option<&Path>, branch: Option<&str>) -> Result<Self> {
        let workspace = match workspace {
            Some(root) => Workspace::load(root)?,
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| Error::Config(format!("cannot read current directory: {e}")))?;
                Workspace::discover(&cwd)?
            }
        };
        let registry = PlatformRegistry::new(workspace.settings.retry.to_options());
        let git = GitCli::new();

        let branch = match branch {
            Some(branch) => branch.to_string(),
            None => current_branch(&workspace, &git).await?,
        };
        debug!(root = %workspace.root.display(), %branch, "command context ready");

        Ok(Self {
            workspace,
            registry,
            git,
            branch,
        })
    }

    /// Linker bound to this context
    pub fn linker(&self) -> Linker<'_> {
        Linker::new(&self.workspace, &self.registry, &self.git)
    }
}

async fn current_branch(workspace: &Workspace, git: &GitCli) -> Result<String> {
    for repo in workspace.manifest.iter().chain(&workspace.repos) {
        if !git.path_exists(&repo.path).await {
            continue;
        }
        match git.current_branch(&repo.path).await {
            Ok(branch) => return Ok(branch),
            Err(e) => debug!(repo = %repo.name, error = %e, "no current branch"),
        }
    }
    Err(Error::Git(
        "could not determine the current branch; pass --branch".to_string(),
    ))
}
