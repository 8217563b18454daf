//! Auth command - test and explain credential setup

use anstream::println;
use anyhow::Result;
use codi_repo::auth::{AuthSource, get_auth};
use codi_repo::types::Platform;

/// Resolve a token for `platform` and report where it came from
pub async fn run_auth_test(platform: Platform, host: Option<&str>) -> Result<()> {
    println!("Testing {platform} authentication...");
    let token = get_auth(platform, host).await?;
    let source = match token.source {
        AuthSource::EnvVar => "environment variable",
        AuthSource::Cli => "CLI tool",
    };
    println!("Token found ({source})");
    if let Some(host) = host {
        println!("Host: {host}");
    }
    Ok(())
}

/// Print setup instructions
pub fn run_auth_setup(platform: Platform) {
    match platform {
        Platform::GitHub => {
            println!("GitHub Authentication Setup");
            println!("===========================");
            println!();
            println!("Option 1: GitHub CLI (recommended)");
            println!("  Install: https://cli.github.com/");
            println!("  Run: gh auth login");
            println!();
            println!("Option 2: Environment variable");
            println!("  Set GITHUB_TOKEN or GH_TOKEN");
            println!();
            println!("For GitHub Enterprise:");
            println!("  Set GH_HOST to your instance hostname");
        }
        Platform::GitLab => {
            println!("GitLab Authentication Setup");
            println!("===========================");
            println!();
            println!("Option 1: GitLab CLI (glab)");
            println!("  Install: https://gitlab.com/gitlab-org/cli");
            println!("  Run: glab auth login");
            println!();
            println!("Option 2: Environment variable");
            println!("  Set GITLAB_TOKEN or GL_TOKEN");
            println!();
            println!("For self-hosted GitLab:");
            println!("  Set GITLAB_HOST to your instance hostname");
        }
        Platform::AzureDevOps => {
            println!("Azure DevOps Authentication Setup");
            println!("=================================");
            println!();
            println!("Option 1: Personal access token");
            println!("  Create one with Code (Read & Write) scope");
            println!("  Set AZURE_DEVOPS_TOKEN or AZURE_DEVOPS_EXT_PAT");
            println!();
            println!("Option 2: Azure CLI");
            println!("  Install: https://learn.microsoft.com/cli/azure/");
            println!("  Run: az login");
        }
    }
}
