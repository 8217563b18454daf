//! GitLab authentication

use super::{AuthToken, token_from_cli, token_from_env};
use crate::error::{Error, Result};
use std::env;

/// Get GitLab authentication
///
/// Priority:
/// 1. `GITLAB_TOKEN` environment variable
/// 2. `GL_TOKEN` environment variable
/// 3. glab CLI (`glab auth token`)
pub async fn get_gitlab_auth(host: Option<&str>) -> Result<AuthToken> {
    if let Some(auth) = token_from_env(&["GITLAB_TOKEN", "GL_TOKEN"]) {
        return Ok(auth);
    }

    let host = host
        .map(String::from)
        .or_else(|| env::var("GITLAB_HOST").ok())
        .unwrap_or_else(|| "gitlab.com".to_string());

    token_from_cli("glab", &["auth", "token", "--hostname", &host])
        .await
        .ok_or_else(|| {
            Error::Auth(
                "No GitLab authentication found. Set GITLAB_TOKEN or run `glab auth login`"
                    .to_string(),
            )
        })
}
