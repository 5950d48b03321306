//! Issue lifecycle rules
//!
//! Pure functions over an [`Issue`]; the service applies their results
//! inside a store transaction.

use crate::issue::{Issue, Status};
use crate::points::PointEvent;
use chrono::Utc;

/// Outcome of an actual status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub to: Status,
    /// Bonus owed to the reporter, if this status has not paid out before
    pub bonus: Option<PointEvent>,
}

/// Bonus attached to entering a status
pub fn status_bonus(status: Status) -> Option<PointEvent> {
    match status {
        Status::Verified => Some(PointEvent::IssueVerified),
        Status::Resolved => Some(PointEvent::IssueResolved),
        _ => None,
    }
}

/// Move `issue` to `next`. Returns `None` when the status is unchanged.
///
/// Bonuses are paid at most once per (issue, status): toggling a status
/// back and forth still notifies but does not award points again.
pub fn transition(issue: &mut Issue, next: Status) -> Option<Transition> {
    let from = issue.status;
    if from == next {
        return None;
    }

    issue.status = next;
    issue.touch();

    let bonus = status_bonus(next).filter(|_| issue.rewarded_statuses.insert(next));

    Some(Transition {
        from,
        to: next,
        bonus,
    })
}

/// Whether the vote count should now verify the issue on its own.
///
/// Fires once per issue lifetime, only out of `reported`.
pub fn should_auto_verify(issue: &Issue, threshold: u32) -> bool {
    issue.status == Status::Reported
        && issue.votes_count >= threshold
        && issue.auto_verified_at.is_none()
}

/// Apply the automatic verification if due
pub fn auto_verify(issue: &mut Issue, threshold: u32) -> Option<Transition> {
    if !should_auto_verify(issue, threshold) {
        return None;
    }
    issue.auto_verified_at = Some(Utc::now());
    transition(issue, Status::Verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Category, NewIssue};

    fn issue() -> Issue {
        let draft = NewIssue::new(
            "Pothole",
            "Big pothole on Elm Street",
            Category::Pothole,
            40.0,
            -74.0,
            None,
        )
        .unwrap();
        Issue::new(1, 1, draft)
    }

    #[test]
    fn same_status_is_not_a_transition() {
        let mut issue = issue();
        assert_eq!(transition(&mut issue, Status::Reported), None);
    }

    #[test]
    fn bonus_paid_once_per_status() {
        let mut issue = issue();

        let t = transition(&mut issue, Status::Verified).unwrap();
        assert_eq!(t.bonus, Some(PointEvent::IssueVerified));

        let t = transition(&mut issue, Status::Reported).unwrap();
        assert_eq!(t.bonus, None);

        let t = transition(&mut issue, Status::Verified).unwrap();
        assert_eq!(t.from, Status::Reported);
        assert_eq!(t.bonus, None);

        let t = transition(&mut issue, Status::Resolved).unwrap();
        assert_eq!(t.bonus, Some(PointEvent::IssueResolved));
    }

    #[test]
    fn auto_verify_needs_threshold_and_reported() {
        let mut issue = issue();
        issue.votes_count = 2;
        assert!(auto_verify(&mut issue, 3).is_none());

        issue.votes_count = 3;
        let t = auto_verify(&mut issue, 3).unwrap();
        assert_eq!(t.to, Status::Verified);
        assert!(issue.auto_verified_at.is_some());

        issue.votes_count = 4;
        assert!(auto_verify(&mut issue, 3).is_none());
    }

    #[test]
    fn auto_verify_does_not_refire_after_revert() {
        let mut issue = issue();
        issue.votes_count = 3;
        auto_verify(&mut issue, 3).unwrap();

        transition(&mut issue, Status::Reported);
        issue.votes_count = 5;
        assert!(auto_verify(&mut issue, 3).is_none());
        assert_eq!(issue.status, Status::Reported);
    }

    #[test]
    fn auto_verify_skips_issues_already_past_reported() {
        let mut issue = issue();
        transition(&mut issue, Status::InProgress);
        issue.votes_count = 10;
        assert!(auto_verify(&mut issue, 3).is_none());
    }
}
