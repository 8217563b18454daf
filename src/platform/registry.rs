//! Platform service registry
//!
//! Hands out one shared service per `(platform, API base URL)` so that a
//! self-hosted instance never collides with the public SaaS instance of the
//! same platform. The registry is an explicit value owned by the caller.

use crate::error::Result;
use crate::platform::{AzureDevOpsService, GitHubService, GitLabService, PlatformService};
use crate::retry::RetryOptions;
use crate::types::{Platform, RepoInfo};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

type ServiceKey = (Platform, String);

/// Registry of platform services
pub struct PlatformRegistry {
    retry: RetryOptions,
    services: Mutex<HashMap<ServiceKey, Arc<dyn PlatformService>>>,
}

impl PlatformRegistry {
    /// Create an empty registry; services built later use `retry`
    pub fn new(retry: RetryOptions) -> Self {
        Self {
            retry,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Install a service for `(platform, base_url)`, replacing any existing one
    pub fn register(&self, platform: Platform, base_url: &str, service: Arc<dyn PlatformService>) {
        self.lock().insert((platform, normalize(base_url)), service);
    }

    /// Get or build the service for `platform` at `base_url`
    pub fn get(&self, platform: Platform, base_url: &str) -> Result<Arc<dyn PlatformService>> {
        let key = (platform, normalize(base_url));
        let mut services = self.lock();
        if let Some(service) = services.get(&key) {
            return Ok(Arc::clone(service));
        }

        debug!(%platform, base_url = %key.1, "creating platform service");
        let service: Arc<dyn PlatformService> = match platform {
            Platform::GitHub => Arc::new(GitHubService::new(&key.1, self.retry.clone())?),
            Platform::GitLab => Arc::new(GitLabService::new(&key.1, self.retry.clone())?),
            Platform::AzureDevOps => {
                Arc::new(AzureDevOpsService::new(&key.1, self.retry.clone())?)
            }
        };
        services.insert(key, Arc::clone(&service));
        Ok(service)
    }

    /// Service for a workspace repository
    pub fn for_repo(&self, repo: &RepoInfo) -> Result<Arc<dyn PlatformService>> {
        self.get(repo.platform, &default_api_base(repo.platform, &repo.host))
    }

    /// Number of cached services
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no service has been created or registered yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ServiceKey, Arc<dyn PlatformService>>> {
        self.services
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

/// API base URL for a platform host
pub fn default_api_base(platform: Platform, host: &str) -> String {
    match platform {
        Platform::GitHub if host == "github.com" => "https://api.github.com".to_string(),
        Platform::GitHub => format!("https://{host}/api/v3"),
        Platform::GitLab => format!("https://{host}"),
        Platform::AzureDevOps => "https://dev.azure.com".to_string(),
    }
}

fn normalize(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<ServiceKey> = self.lock().keys().cloned().collect();
        f.debug_struct("PlatformRegistry").field("services", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_reuses_service() {
        let registry = PlatformRegistry::default();
        let a = registry.get(Platform::GitHub, "https://api.github.com").unwrap();
        let b = registry.get(Platform::GitHub, "https://api.github.com/").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_self_hosted_does_not_collide() {
        let registry = PlatformRegistry::default();
        let saas = registry.get(Platform::GitLab, "https://gitlab.com").unwrap();
        let hosted = registry.get(Platform::GitLab, "https://gitlab.corp.example").unwrap();
        assert!(!Arc::ptr_eq(&saas, &hosted));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_services_report_their_platform() {
        let registry = PlatformRegistry::default();
        for platform in [Platform::GitHub, Platform::GitLab, Platform::AzureDevOps] {
            let base = default_api_base(platform, "example.com");
            assert_eq!(registry.get(platform, &base).unwrap().platform(), platform);
        }
    }

    #[test]
    fn test_default_api_base() {
        assert_eq!(default_api_base(Platform::GitHub, "github.com"), "https://api.github.com");
        assert_eq!(
            default_api_base(Platform::GitHub, "ghe.corp"),
            "https://ghe.corp/api/v3"
        );
        assert_eq!(default_api_base(Platform::GitLab, "gitlab.com"), "https://gitlab.com");
    }
}
