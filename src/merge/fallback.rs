//! Merge-method fallback ladder
//!
//! When a platform refuses the requested method, the repository's allowed
//! methods are queried and the remaining methods are tried in the order
//! squash, rebase, merge.

use crate::error::Result;
use crate::platform::{PlatformService, RepoId};
use crate::types::{AllowedMergeMethods, MergeMethod, MergeOptions, MergeResult};
use tracing::{debug, warn};

/// Methods to try after `attempted` was refused
///
/// Ladder order, minus the attempted method and anything `allowed` rules out.
pub fn fallback_order(
    attempted: MergeMethod,
    allowed: Option<AllowedMergeMethods>,
) -> Vec<MergeMethod> {
    MergeMethod::LADDER
        .into_iter()
        .filter(|m| *m != attempted)
        .filter(|m| allowed.is_none_or(|a| a.allows(*m)))
        .collect()
}

/// Result of a merge with fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodOutcome {
    /// Result of the last attempt
    pub result: MergeResult,
    /// Method of the last attempt (the one that merged, on success)
    pub method: MergeMethod,
    /// Every method tried, in order
    pub attempted: Vec<MergeMethod>,
}

async fn attempt(
    service: &dyn PlatformService,
    repo: &RepoId,
    number: u64,
    options: MergeOptions,
) -> Result<MergeResult> {
    match service.merge_pull_request(repo, number, &options).await {
        Ok(result) => Ok(result),
        Err(e) if service.is_method_rejection(&e.to_string()) => {
            Ok(MergeResult::rejected(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

fn refused_for_method(service: &dyn PlatformService, result: &MergeResult) -> bool {
    !result.merged
        && result
            .message
            .as_deref()
            .is_some_and(|m| service.is_method_rejection(m))
}

/// Merge a PR, walking the fallback ladder if the method is refused
///
/// Stops at the first success or at the first refusal that is not about
/// the method (conflicts, policy). Methods are recorded as the platform
/// performs them, and a rung the platform would send identically to an
/// earlier attempt is skipped. Transport and auth errors propagate.
pub async fn merge_with_fallback(
    service: &dyn PlatformService,
    repo: &RepoId,
    number: u64,
    method: MergeMethod,
    delete_branch: bool,
) -> Result<MethodOutcome> {
    let method = service.effective_merge_method(method);
    let mut attempted = vec![method];
    let mut result = attempt(service, repo, number, MergeOptions { method, delete_branch }).await?;
    let mut used = method;

    if !refused_for_method(service, &result) {
        return Ok(MethodOutcome {
            result,
            method: used,
            attempted,
        });
    }

    let allowed = match service.get_allowed_merge_methods(repo).await {
        Ok(allowed) => allowed,
        Err(e) => {
            warn!(%repo, error = %e, "could not query allowed merge methods");
            None
        }
    };

    for candidate in fallback_order(method, allowed) {
        let candidate = service.effective_merge_method(candidate);
        if attempted.contains(&candidate) {
            continue;
        }
        debug!(%repo, pr_number = number, from = %used, to = %candidate, "retrying merge with another method");
        attempted.push(candidate);
        used = candidate;
        result = attempt(
            service,
            repo,
            number,
            MergeOptions {
                method: candidate,
                delete_branch,
            },
        )
        .await?;
        if !refused_for_method(service, &result) {
            break;
        }
    }

    Ok(MethodOutcome {
        result,
        method: used,
        attempted,
    })
}
