//! GitHub authentication

use super::{AuthToken, token_from_cli, token_from_env};
use crate::error::{Error, Result};

/// Get GitHub authentication
///
/// Priority:
/// 1. `GITHUB_TOKEN` environment variable
/// 2. `GH_TOKEN` environment variable
/// 3. gh CLI (`gh auth token`)
pub async fn get_github_auth(host: Option<&str>) -> Result<AuthToken> {
    if let Some(auth) = token_from_env(&["GITHUB_TOKEN", "GH_TOKEN"]) {
        return Ok(auth);
    }

    let cli = match host {
        Some(h) if h != "github.com" => {
            token_from_cli("gh", &["auth", "token", "--hostname", h]).await
        }
        _ => token_from_cli("gh", &["auth", "token"]).await,
    };

    cli.ok_or_else(|| {
        Error::Auth(
            "No GitHub authentication found. Set GITHUB_TOKEN or run `gh auth login`".to_string(),
        )
    })
}
