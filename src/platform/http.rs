//! Response handling shared by the REST adapters

use crate::error::{Error, Result};
use crate::types::{MergeResult, Platform};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Per-request timeout for raw REST calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client used by every adapter
pub(crate) fn client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("codi-repo/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::Internal(format!("failed to create HTTP client: {e}")))
}

/// Turn a non-2xx response into [`Error::Http`]
pub(crate) async fn ensure_success(platform: Platform, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::http(platform, status.as_u16(), message.trim()))
}

/// Decode a successful JSON response
pub(crate) async fn read_json<T: DeserializeOwned>(
    platform: Platform,
    response: Response,
) -> Result<T> {
    let response = ensure_success(platform, response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| Error::MalformedResponse(format!("{platform}: {e}")))
}

/// Map a merge rejection status into a declined [`MergeResult`]
///
/// Anything else is still an error.
pub(crate) fn declined_merge(error: Error, declined: &[u16]) -> Result<MergeResult> {
    match &error {
        Error::Http {
            status, message, ..
        } if declined.contains(status) => {
            Ok(MergeResult::rejected(format!("HTTP {status}: {message}")))
        }
        _ => Err(error),
    }
}
