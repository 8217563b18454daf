//! Credential discovery for GitHub, GitLab and Azure DevOps
//!
//! Environment variables are consulted first, then each platform's companion
//! CLI (`gh`, `glab`, `az`). Tokens are never logged or persisted.

mod azure;
mod github;
mod gitlab;

pub use azure::get_azure_auth;
pub use github::get_github_auth;
pub use gitlab::get_gitlab_auth;

use crate::error::Result;
use crate::types::Platform;
use tokio::process::Command;

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh, glab or az)
    Cli,
    /// Token from environment variable
    EnvVar,
}

/// A resolved credential
#[derive(Clone)]
pub struct AuthToken {
    /// The secret
    pub token: String,
    /// Where the token was obtained from
    pub source: AuthSource,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve a credential for `platform`
pub async fn get_auth(platform: Platform, host: Option<&str>) -> Result<AuthToken> {
    match platform {
        Platform::GitHub => get_github_auth(host).await,
        Platform::GitLab => get_gitlab_auth(host).await,
        Platform::AzureDevOps => get_azure_auth().await,
    }
}

/// First non-empty environment variable among `names`
fn token_from_env(names: &[&str]) -> Option<AuthToken> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .map(|token| AuthToken {
            token,
            source: AuthSource::EnvVar,
        })
}

/// Run a companion CLI and return its trimmed stdout on success
async fn token_from_cli(program: &str, args: &[&str]) -> Option<AuthToken> {
    let output = Command::new(program).args(args).output().await.ok()?;

    if !output.status.success() {
        return None;
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(AuthToken {
            token,
            source: AuthSource::Cli,
        })
    }
}
