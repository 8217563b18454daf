//! Platform detection and URL grammar for remote URLs
//!
//! Supported shapes:
//! - `git@host:owner/repo[.git]`, `ssh://git@host[:port]/owner/repo[.git]`
//! - `https://host/owner/repo[.git]`
//! - GitLab nested namespaces: `group/subgroup/repo`
//! - Azure DevOps: `https://dev.azure.com/org/project/_git/repo`,
//!   `https://org.visualstudio.com/project/_git/repo`,
//!   `git@ssh.dev.azure.com:v3/org/project/repo`

use crate::error::{Error, Result};
use crate::types::{Platform, RepoCoordinates};
use regex::Regex;
use std::env;
use std::sync::LazyLock;

static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@([^:/]+):(.+)$").expect("hardcoded scp-like regex is valid")
});

/// Detect the platform a remote URL belongs to
pub fn detect_platform(url: &str) -> Option<Platform> {
    let (host, _) = split_remote(url)?;

    if is_azure_host(&host) {
        Some(Platform::AzureDevOps)
    } else if is_github_host(&host) {
        Some(Platform::GitHub)
    } else if is_gitlab_host(&host) {
        Some(Platform::GitLab)
    } else {
        None
    }
}

/// Parse a remote URL into platform + coordinates
///
/// `platform` overrides detection, for self-hosted instances whose host name
/// gives no hint.
pub fn parse_repo_url(url: &str, platform: Option<Platform>) -> Result<(Platform, RepoCoordinates)> {
    let platform = platform
        .or_else(|| detect_platform(url))
        .ok_or_else(|| Error::UnsupportedUrl(url.to_string()))?;

    let coords = match platform {
        Platform::GitHub => parse_github_url(url),
        Platform::GitLab => parse_gitlab_url(url),
        Platform::AzureDevOps => parse_azure_url(url),
    }
    .ok_or_else(|| Error::Parse(format!("cannot parse {platform} remote URL: {url}")))?;

    Ok((platform, coords))
}

/// GitHub grammar: exactly `owner/repo`
pub(crate) fn parse_github_url(url: &str) -> Option<RepoCoordinates> {
    let (host, path) = split_remote(url)?;
    let parts: Vec<&str> = path.split('/').collect();
    let [owner, repo] = parts.as_slice() else {
        return None;
    };
    coordinates(host, owner, repo, None)
}

/// GitLab grammar: everything but the last segment is the namespace
pub(crate) fn parse_gitlab_url(url: &str) -> Option<RepoCoordinates> {
    let (host, path) = split_remote(url)?;
    let (owner, repo) = path.rsplit_once('/')?;
    coordinates(host, owner, repo, None)
}

/// Azure DevOps grammar: organization, project and repository
pub(crate) fn parse_azure_url(url: &str) -> Option<RepoCoordinates> {
    let (host, path) = split_remote(url)?;
    let parts: Vec<&str> = path.split('/').collect();

    let (org, project, repo) = if host == "ssh.dev.azure.com" || host.ends_with("vs-ssh.visualstudio.com") {
        match parts.as_slice() {
            ["v3", org, project, repo] => (org.to_string(), *project, *repo),
            _ => return None,
        }
    } else if host == "dev.azure.com" {
        match parts.as_slice() {
            [org, project, "_git", repo] => (org.to_string(), *project, *repo),
            _ => return None,
        }
    } else if let Some(org) = host.strip_suffix(".visualstudio.com") {
        match parts.as_slice() {
            [project, "_git", repo] | [_, project, "_git", repo] => (org.to_string(), *project, *repo),
            _ => return None,
        }
    } else {
        return None;
    };

    let project = urlencoding::decode(project).ok()?.into_owned();
    let repo = urlencoding::decode(repo).ok()?.into_owned();
    coordinates(host, &org, &repo, Some(project))
}

fn coordinates(
    host: String,
    owner: &str,
    repo: &str,
    project: Option<String>,
) -> Option<RepoCoordinates> {
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(RepoCoordinates {
        host,
        owner: owner.to_string(),
        repo: repo.to_string(),
        project,
    })
}

fn is_github_host(host: &str) -> bool {
    let gh_host = env::var("GH_HOST").ok();
    host == "github.com"
        || host.ends_with(".github.com")
        || host.contains("github")
        || gh_host.is_some_and(|h| host == h)
}

fn is_gitlab_host(host: &str) -> bool {
    let gitlab_host = env::var("GITLAB_HOST").ok();
    host == "gitlab.com"
        || host.ends_with(".gitlab.com")
        || host.contains("gitlab")
        || gitlab_host.is_some_and(|h| host == h)
}

fn is_azure_host(host: &str) -> bool {
    host == "dev.azure.com" || host == "ssh.dev.azure.com" || host.ends_with(".visualstudio.com")
}

/// Split a remote URL into (hostname, path without `.git` and slashes)
fn split_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();

    let (host, path) = if let Some(caps) = SCP_LIKE.captures(url).filter(|_| !url.contains("://")) {
        (caps[1].to_string(), caps[2].to_string())
    } else {
        let parsed = url::Url::parse(url).ok()?;
        (parsed.host_str()?.to_string(), parsed.path().to_string())
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path).trim_end_matches('/');
    if path.is_empty() {
        return None;
    }
    Some((host.to_ascii_lowercase(), path.to_string()))
}
