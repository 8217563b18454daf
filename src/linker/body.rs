//! Manifest PR body rendering

use crate::platform::{PrLink, generate_linked_pr_comment, parse_linked_pr_comment};
use crate::types::{LinkedPr, PrState};
use std::fmt::Write;

fn state_icon(state: PrState) -> &'static str {
    match state {
        PrState::Open => "🟢",
        PrState::Merged => "🟣",
        PrState::Closed => "🔴",
    }
}

fn checks_icon(pr: &LinkedPr) -> &'static str {
    if pr.checks_pass {
        "✅"
    } else if pr.checks.is_some_and(|c| c.failed == 0 && c.pending > 0) {
        "⏳"
    } else {
        "❌"
    }
}

/// Links for the hidden marker, using each PR's platform sigil
pub fn links_for(linked_prs: &[LinkedPr]) -> Vec<PrLink> {
    linked_prs
        .iter()
        .map(|pr| PrLink::new(&pr.repo_name, pr.number, pr.platform))
        .collect()
}

/// Render the manifest PR body
///
/// A fixed-format table of the linked PRs followed by the hidden links
/// marker. `extra_body` is placed between the heading and the table.
pub fn generate_manifest_pr_body(
    title: &str,
    linked_prs: &[LinkedPr],
    extra_body: Option<&str>,
) -> String {
    let mut body = format!("## {title}\n\n");

    if let Some(extra) = extra_body.map(str::trim).filter(|e| !e.is_empty()) {
        body.push_str(extra);
        body.push_str("\n\n");
    }

    body.push_str("### Linked pull requests\n\n");
    body.push_str("| Repository | PR | State | Approved | Checks |\n");
    body.push_str("|------------|----|-------|----------|--------|\n");
    for pr in linked_prs {
        let sigil = pr.platform.reference_sigil();
        let _ = writeln!(
            body,
            "| {} | [{sigil}{}]({}) | {} {} | {} | {} |",
            pr.repo_name,
            pr.number,
            pr.url,
            state_icon(pr.state),
            pr.state,
            if pr.approved { "✅" } else { "❌" },
            checks_icon(pr),
        );
    }

    body.push('\n');
    body.push_str(&generate_linked_pr_comment(&links_for(linked_prs)));
    body.push('\n');
    body
}

/// Inverse of the marker part of [`generate_manifest_pr_body`]
pub fn parse_linked_prs_from_body(body: &str) -> Vec<PrLink> {
    parse_linked_pr_comment(body)
}
