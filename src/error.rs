//! Error types for codi-repo

use crate::types::Platform;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by codi-repo
#[derive(Debug, Error)]
pub enum Error {
    /// No credential could be found for a platform
    #[error("authentication error: {0}")]
    Auth(String),

    /// Connection-level failure (reset, refused, DNS, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// The platform answered with a non-success HTTP status
    #[error("{platform} API error (HTTP {status}): {message}")]
    Http {
        /// Platform that produced the response
        platform: Platform,
        /// HTTP status code
        status: u16,
        /// Message reported by the platform
        message: String,
    },

    /// A PR, branch or repository does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform answered with a body we could not understand
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The overall deadline elapsed
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Repository URL did not match any supported platform
    #[error("unsupported repository URL: {0}")]
    UnsupportedUrl(String),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Workspace configuration error
    #[error("config error: {0}")]
    Config(String),

    /// State file could not be read or written
    #[error("state file error: {0}")]
    State(String),

    /// Local git operation failed
    #[error("git error: {0}")]
    Git(String),

    /// Repository name is not part of the workspace
    #[error("repository not in workspace: {0}")]
    RepoNotFound(String),

    /// Platform failure without a structured status
    #[error("platform error: {0}")]
    Platform(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status carried by this error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a connection-level failure
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Build an HTTP error from a status and body text
    pub fn http(platform: Platform, status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            platform,
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return Self::Network(e.to_string());
        }
        if e.is_decode() {
            return Self::MalformedResponse(e.to_string());
        }
        e.status().map_or_else(
            || Self::Platform(e.to_string()),
            |status| Self::Platform(format!("HTTP {}: {e}", status.as_u16())),
        )
    }
}

impl From<octocrab::Error> for Error {
    fn from(e: octocrab::Error) -> Self {
        match &e {
            octocrab::Error::GitHub { source, .. } => Self::Http {
                platform: Platform::GitHub,
                status: source.status_code.as_u16(),
                message: source.message.clone(),
            },
            octocrab::Error::Serde { .. } => Self::MalformedResponse(e.to_string()),
            octocrab::Error::Service { .. } => Self::Network(e.to_string()),
            _ => Self::Platform(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}
