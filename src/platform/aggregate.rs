//! Check and review aggregation shared by every platform

use crate::types::{CheckState, PrReview, ReviewState, StatusCheck, StatusCheckResult};
use std::collections::HashMap;

/// Fold individual checks into one overall state
///
/// - no checks: `success` (absence of CI is not failure)
/// - any `failure`: `failure`
/// - else any `pending`: `pending`
/// - else `success` (skipped counts as passing)
pub fn aggregate_status(statuses: Vec<StatusCheck>) -> StatusCheckResult {
    let state = if statuses.iter().any(|s| s.state == CheckState::Failure) {
        CheckState::Failure
    } else if statuses.iter().any(|s| s.state == CheckState::Pending) {
        CheckState::Pending
    } else {
        CheckState::Success
    };

    StatusCheckResult { state, statuses }
}

/// Approved iff some reviewer approves and none requests changes
///
/// Only each reviewer's latest decisive review counts; comment-only reviews
/// don't override an earlier approval or change request.
pub fn approval_from_reviews(reviews: &[PrReview]) -> bool {
    let mut latest: HashMap<&str, ReviewState> = HashMap::new();
    for review in reviews {
        match review.state {
            ReviewState::Approved | ReviewState::ChangesRequested => {
                latest.insert(review.user.as_str(), review.state);
            }
            ReviewState::Commented | ReviewState::Pending => {}
        }
    }

    latest.values().any(|s| *s == ReviewState::Approved)
        && !latest.values().any(|s| *s == ReviewState::ChangesRequested)
}
