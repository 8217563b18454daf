//! Working-tree operations on pre-cloned local repositories
//!
//! Local reads (current branch, branch existence) go through gix; anything
//! touching a remote or needing revision walking shells out to `git`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Git operations the linker and CLI need from a local clone
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Whether `path` exists on disk
    async fn path_exists(&self, path: &Path) -> bool;

    /// Name of the checked-out branch
    async fn current_branch(&self, path: &Path) -> Result<String>;

    /// Whether HEAD has commits not on `origin/<base_branch>` (or `<base_branch>`)
    async fn has_commits_ahead(&self, path: &Path, base_branch: &str) -> Result<bool>;

    /// Whether `branch` exists on `origin`
    async fn remote_branch_exists(&self, path: &Path, branch: &str) -> Result<bool>;

    /// Push `branch` to `remote`
    async fn push_branch(
        &self,
        path: &Path,
        branch: &str,
        remote: &str,
        set_upstream: bool,
    ) -> Result<()>;

    /// Whether a local branch named `branch` exists
    async fn branch_exists(&self, path: &Path, branch: &str) -> Result<bool>;
}

/// [`GitOps`] backed by gix and the `git` binary
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    /// Create a new instance
    pub const fn new() -> Self {
        Self
    }
}

/// Run `git` in `path`, returning trimmed stdout
async fn git(path: &Path, args: &[&str]) -> Result<String> {
    debug!(path = %path.display(), ?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .await
        .map_err(|e| Error::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!(
            "git {} failed in {}: {}",
            args.join(" "),
            path.display(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Open a repository with gix on the blocking pool
async fn with_repo<T, F>(path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&gix::Repository) -> Result<T> + Send + 'static,
{
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let repo = gix::open(&path)
            .map_err(|e| Error::Git(format!("failed to open {}: {e}", path.display())))?;
        f(&repo)
    })
    .await
    .map_err(|e| Error::Internal(format!("git task failed: {e}")))?
}

#[async_trait]
impl GitOps for GitCli {
    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn current_branch(&self, path: &Path) -> Result<String> {
        with_repo(path, |repo| {
            let head = repo
                .head_name()
                .map_err(|e| Error::Git(format!("failed to read HEAD: {e}")))?;
            head.map(|name| name.shorten().to_string())
                .ok_or_else(|| Error::Git("HEAD is detached".to_string()))
        })
        .await
    }

    async fn has_commits_ahead(&self, path: &Path, base_branch: &str) -> Result<bool> {
        let remote_base = format!("origin/{base_branch}");
        let base = if git(path, &["rev-parse", "--verify", "--quiet", &remote_base])
            .await
            .is_ok()
        {
            remote_base
        } else {
            base_branch.to_string()
        };

        let count = git(path, &["rev-list", "--count", &format!("{base}..HEAD")]).await?;
        let count: u64 = count
            .parse()
            .map_err(|e| Error::Git(format!("unexpected rev-list output {count:?}: {e}")))?;
        Ok(count > 0)
    }

    async fn remote_branch_exists(&self, path: &Path, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        let out = git(path, &["ls-remote", "--heads", "origin", &refname]).await?;
        Ok(!out.is_empty())
    }

    async fn push_branch(
        &self,
        path: &Path,
        branch: &str,
        remote: &str,
        set_upstream: bool,
    ) -> Result<()> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.extend([remote, branch]);
        git(path, &args).await.map(drop)
    }

    async fn branch_exists(&self, path: &Path, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{branch}");
        with_repo(path, move |repo| {
            repo.try_find_reference(refname.as_str())
                .map(|r| r.is_some())
                .map_err(|e| Error::Git(format!("failed to look up {refname}: {e}")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn run_git(dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn test_current_branch_and_branch_exists() {
        let repo = make_repo();
        run_git(repo.path(), &["checkout", "-b", "feat/x"]);

        let git = GitCli::new();
        assert_eq!(git.current_branch(repo.path()).await.unwrap(), "feat/x");
        assert!(git.branch_exists(repo.path(), "main").await.unwrap());
        assert!(git.branch_exists(repo.path(), "feat/x").await.unwrap());
        assert!(!git.branch_exists(repo.path(), "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_has_commits_ahead_against_local_base() {
        let repo = make_repo();
        let git = GitCli::new();
        run_git(repo.path(), &["checkout", "-b", "feat"]);
        assert!(!git.has_commits_ahead(repo.path(), "main").await.unwrap());

        run_git(repo.path(), &["commit", "--allow-empty", "-m", "work"]);
        assert!(git.has_commits_ahead(repo.path(), "main").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_exists() {
        let repo = make_repo();
        let git = GitCli::new();
        assert!(git.path_exists(repo.path()).await);
        assert!(!git.path_exists(&repo.path().join("missing")).await);
    }

    #[tokio::test]
    async fn test_open_non_repo_is_git_error() {
        let dir = TempDir::new().unwrap();
        let err = GitCli::new().current_branch(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Git(_)));
    }
}
