//! Hidden marker linking a manifest PR to its child PRs
//!
//! Wire format, appended to the manifest PR body:
//!
//! ```text
//! <!-- codi-repo:links:frontend#12,backend!34 -->
//! ```
//!
//! `#` is the GitHub/Azure DevOps reference sigil and `!` the GitLab one; a
//! single marker may mix both.

use crate::types::Platform;
use regex::Regex;
use std::sync::LazyLock;

/// Opening of the links marker
pub const LINKS_MARKER_PREFIX: &str = "<!-- codi-repo:links:";

const LINKS_MARKER_SUFFIX: &str = " -->";

static LINKS_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- codi-repo:links:(.*?) -->").expect("hardcoded links regex is valid")
});

/// One repository → PR number association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrLink {
    /// Workspace repository name
    pub repo_name: String,
    /// PR/MR number
    pub number: u64,
    /// Reference sigil, `#` or `!`
    pub sigil: char,
}

impl PrLink {
    /// Link using `platform`'s reference sigil
    pub fn new(repo_name: impl Into<String>, number: u64, platform: Platform) -> Self {
        Self {
            repo_name: repo_name.into(),
            number,
            sigil: platform.reference_sigil(),
        }
    }
}

impl std::fmt::Display for PrLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.repo_name, self.sigil, self.number)
    }
}

/// Render the marker line
pub fn generate_linked_pr_comment(links: &[PrLink]) -> String {
    let joined = links
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{LINKS_MARKER_PREFIX}{joined}{LINKS_MARKER_SUFFIX}")
}

/// Parse the marker out of a PR body
///
/// A body without a marker yields no links; malformed entries are skipped.
pub fn parse_linked_pr_comment(body: &str) -> Vec<PrLink> {
    let Some(payload) = LINKS_MARKER
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
    else {
        return Vec::new();
    };

    payload
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<PrLink> {
    let sigil = entry.chars().find(|c| matches!(c, '#' | '!'))?;
    let parts: Vec<&str> = entry.split(['#', '!']).collect();
    let [name, number] = parts.as_slice() else {
        return None;
    };
    if name.is_empty() {
        return None;
    }

    Some(PrLink {
        repo_name: (*name).to_string(),
        number: number.parse().ok()?,
        sigil,
    })
}
