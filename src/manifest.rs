//! Workspace configuration
//!
//! A workspace is a directory holding `codi-repo.toml`, which names every
//! repository taking part in a linked change plus an optional manifest
//! repository whose PR ties the children together:
//!
//! ```toml
//! [manifest]
//! url = "git@github.com:acme/workspace.git"
//!
//! [repos.api]
//! url = "git@gitlab.com:acme/backend/api.git"
//! default_branch = "develop"
//!
//! [repos.web]
//! url = "https://github.com/acme/web.git"
//!
//! [settings]
//! merge_strategy = "independent"
//! ```

use crate::error::{Error, Result};
use crate::platform::parse_repo_url;
use crate::retry::RetryOptions;
use crate::types::{MergeMethod, MergeStrategy, Platform, RepoInfo};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file name at the workspace root
pub const CONFIG_FILE: &str = "codi-repo.toml";

/// Name given to the manifest repository in reports and links
pub const MANIFEST_REPO_NAME: &str = "manifest";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    manifest: Option<RawRepo>,
    #[serde(default)]
    repos: BTreeMap<String, RawRepo>,
    #[serde(default)]
    settings: Settings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRepo {
    url: String,
    path: Option<PathBuf>,
    default_branch: Option<String>,
    platform: Option<Platform>,
}

/// Workspace-wide behavior
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Failure policy for multi-repo merges
    pub merge_strategy: MergeStrategy,
    /// Preferred merge method
    pub merge_method: MergeMethod,
    /// Delete head branches after merging
    pub delete_branch: bool,
    /// Platform call retry tuning
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::AllOrNothing,
            merge_method: MergeMethod::Squash,
            delete_branch: true,
            retry: RetrySettings::default(),
        }
    }
}

/// `[settings.retry]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff delay in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Jitter fraction
    pub jitter: f64,
    /// Deadline around each retried call, in milliseconds
    pub deadline_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: 0.1,
            deadline_ms: None,
        }
    }
}

impl RetrySettings {
    /// Retry options for platform services
    pub fn to_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            deadline: self.deadline_ms.map(Duration::from_millis),
            ..RetryOptions::default()
        }
    }
}

/// A loaded workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory holding the configuration file
    pub root: PathBuf,
    /// Child repositories ordered by name
    pub repos: Vec<RepoInfo>,
    /// Self-tracking manifest repository, if configured
    pub manifest: Option<RepoInfo>,
    /// Workspace settings
    pub settings: Settings,
}

impl Workspace {
    /// Load `codi-repo.toml` from `root`
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(root, &content)
    }

    /// Walk up from `start` to the nearest directory holding `codi-repo.toml`
    pub fn discover(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_FILE).is_file())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no {CONFIG_FILE} found in {} or any parent directory",
                    start.display()
                ))
            })
            .and_then(Self::load)
    }

    /// Parse configuration text; relative paths resolve against `root`
    pub fn from_toml(root: &Path, content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid {CONFIG_FILE}: {e}")))?;

        if raw.repos.contains_key(MANIFEST_REPO_NAME) {
            return Err(Error::Config(format!(
                "repository name '{MANIFEST_REPO_NAME}' is reserved for the manifest repository"
            )));
        }

        let repos = raw
            .repos
            .into_iter()
            .map(|(name, repo)| {
                let default_path = PathBuf::from(&name);
                resolve_repo(root, name, repo, default_path)
            })
            .collect::<Result<Vec<_>>>()?;

        let manifest = raw
            .manifest
            .map(|repo| resolve_repo(root, MANIFEST_REPO_NAME.to_string(), repo, PathBuf::from(".")))
            .transpose()?;

        Ok(Self {
            root: root.to_path_buf(),
            repos,
            manifest,
            settings: raw.settings,
        })
    }

    /// Look up a child repository by name
    pub fn repo(&self, name: &str) -> Option<&RepoInfo> {
        self.repos.iter().find(|r| r.name == name)
    }

    /// Look up a child repository, failing with [`Error::RepoNotFound`]
    pub fn require_repo(&self, name: &str) -> Result<&RepoInfo> {
        self.repo(name)
            .ok_or_else(|| Error::RepoNotFound(name.to_string()))
    }

    /// Children followed by the manifest repository
    pub fn all_repos(&self) -> impl Iterator<Item = &RepoInfo> {
        self.repos.iter().chain(self.manifest.iter())
    }
}

fn resolve_repo(root: &Path, name: String, raw: RawRepo, default_path: PathBuf) -> Result<RepoInfo> {
    let (platform, coords) = parse_repo_url(&raw.url, raw.platform)
        .map_err(|e| Error::Config(format!("repository '{name}': {e}")))?;
    let path = raw.path.unwrap_or(default_path);
    let path = if path.is_absolute() { path } else { root.join(path) };

    Ok(RepoInfo {
        name,
        url: raw.url,
        path,
        default_branch: raw.default_branch.unwrap_or_else(|| "main".to_string()),
        owner: coords.owner,
        repo: coords.repo,
        project: coords.project,
        platform,
        host: coords.host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[manifest]
url = "git@github.com:acme/workspace.git"

[repos.web]
url = "https://github.com/acme/web.git"

[repos.api]
url = "git@gitlab.com:acme/backend/api.git"
default_branch = "develop"
path = "services/api"

[repos.portal]
url = "https://dev.azure.com/contoso/Web/_git/portal"

[settings]
merge_strategy = "independent"
merge_method = "rebase"

[settings.retry]
max_retries = 5
deadline_ms = 60000
"#;

    #[test]
    fn test_parse_sample() {
        let ws = Workspace::from_toml(Path::new("/ws"), SAMPLE).unwrap();

        let names: Vec<_> = ws.repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["api", "portal", "web"]);

        let api = ws.repo("api").unwrap();
        assert_eq!(api.platform, Platform::GitLab);
        assert_eq!(api.owner, "acme/backend");
        assert_eq!(api.default_branch, "develop");
        assert_eq!(api.path, Path::new("/ws/services/api"));

        let portal = ws.repo("portal").unwrap();
        assert_eq!(portal.platform, Platform::AzureDevOps);
        assert_eq!(portal.project.as_deref(), Some("Web"));
        assert_eq!(portal.path, Path::new("/ws/portal"));

        let manifest = ws.manifest.as_ref().unwrap();
        assert_eq!(manifest.name, MANIFEST_REPO_NAME);
        assert_eq!(manifest.repo, "workspace");
        assert_eq!(ws.all_repos().count(), 4);

        assert_eq!(ws.settings.merge_strategy, MergeStrategy::Independent);
        assert_eq!(ws.settings.merge_method, MergeMethod::Rebase);
        assert!(ws.settings.delete_branch);

        let retry = ws.settings.retry.to_options();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.initial_delay, Duration::from_millis(1000));
        assert_eq!(retry.deadline, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_defaults_without_settings() {
        let ws = Workspace::from_toml(
            Path::new("/ws"),
            "[repos.web]\nurl = \"https://github.com/acme/web\"\n",
        )
        .unwrap();
        assert!(ws.manifest.is_none());
        assert_eq!(ws.settings, Settings::default());
        assert_eq!(ws.repos[0].default_branch, "main");
    }

    #[test]
    fn test_platform_override_for_self_hosted() {
        let ws = Workspace::from_toml(
            Path::new("/ws"),
            "[repos.core]\nurl = \"https://code.corp.example/team/core.git\"\nplatform = \"gitlab\"\n",
        )
        .unwrap();
        assert_eq!(ws.repos[0].platform, Platform::GitLab);
        assert_eq!(ws.repos[0].host, "code.corp.example");
    }

    #[test]
    fn test_unsupported_url_is_config_error() {
        let err = Workspace::from_toml(
            Path::new("/ws"),
            "[repos.x]\nurl = \"https://bitbucket.org/a/b\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("'x'")));
    }

    #[test]
    fn test_reserved_manifest_name() {
        let err = Workspace::from_toml(
            Path::new("/ws"),
            "[repos.manifest]\nurl = \"https://github.com/a/b\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Workspace::from_toml(Path::new("/ws"), "[settings]\nbogus = 1\n").is_err());
    }

    #[test]
    fn test_discover_walks_up() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "[repos.web]\nurl = \"https://github.com/acme/web\"\n",
        )
        .unwrap();
        let nested = temp.path().join("web").join("src");
        fs::create_dir_all(&nested).unwrap();

        let ws = Workspace::discover(&nested).unwrap();
        assert_eq!(ws.root, temp.path());
        assert!(ws.require_repo("web").is_ok());
        assert!(matches!(ws.require_repo("nope"), Err(Error::RepoNotFound(_))));
    }
}
