//! Azure DevOps authentication

use super::{AuthToken, token_from_cli, token_from_env};
use crate::error::{Error, Result};

/// Resource id of Azure DevOps for `az account get-access-token`
const AZURE_DEVOPS_RESOURCE: &str = "499b84ac-1321-427f-aa17-267ca6975798";

/// Get Azure DevOps authentication
///
/// Priority:
/// 1. `AZURE_DEVOPS_TOKEN` environment variable (PAT)
/// 2. `AZURE_DEVOPS_EXT_PAT` environment variable (PAT)
/// 3. az CLI access token (bearer)
pub async fn get_azure_auth() -> Result<AuthToken> {
    if let Some(auth) = token_from_env(&["AZURE_DEVOPS_TOKEN", "AZURE_DEVOPS_EXT_PAT"]) {
        return Ok(auth);
    }

    token_from_cli(
        "az",
        &[
            "account",
            "get-access-token",
            "--resource",
            AZURE_DEVOPS_RESOURCE,
            "--query",
            "accessToken",
            "-o",
            "tsv",
        ],
    )
    .await
    .ok_or_else(|| {
        Error::Auth(
            "No Azure DevOps authentication found. Set AZURE_DEVOPS_TOKEN or run `az login`"
                .to_string(),
        )
    })
}
