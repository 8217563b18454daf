//! codi-repo - linked pull requests across many repositories
//!
//! A workspace is a set of independently hosted git repositories that change
//! together on a shared branch name. This library creates one pull request per
//! repository, ties them to an optional manifest pull request, tracks their
//! combined readiness, and merges them in a fixed order.
//!
//! GitHub, GitLab and Azure DevOps are hidden behind
//! [`platform::PlatformService`].

pub mod auth;
pub mod error;
pub mod git;
pub mod linker;
pub mod manifest;
pub mod merge;
pub mod platform;
pub mod retry;
pub mod tracking;
pub mod types;
