//! CLI commands
//!
//! Command implementations for the `codi-repo` binary. All printing and
//! prompting happens here; the library only returns data.

mod auth;
mod context;
mod create;
mod merge;
mod progress;
mod status;
mod style;

pub use auth::{run_auth_setup, run_auth_test};
pub use create::{CreateCommandOptions, run_create};
pub use merge::{MergeCommandOptions, run_merge};
pub use status::run_status;
