//! Gamification point events

use serde::{Deserialize, Serialize};

/// Every event that moves a user's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointEvent {
    IssueCreated,
    IssueDeleted,
    VoteReceived,
    VoteRetracted,
    IssueVerified,
    IssueResolved,
    CommentPosted,
    CommentDeleted,
}

impl PointEvent {
    pub fn delta(&self) -> i64 {
        match self {
            PointEvent::IssueCreated => 10,
            PointEvent::IssueDeleted => -10,
            PointEvent::VoteReceived => 5,
            PointEvent::VoteRetracted => -5,
            PointEvent::IssueVerified => 15,
            PointEvent::IssueResolved => 25,
            PointEvent::CommentPosted => 2,
            PointEvent::CommentDeleted => -2,
        }
    }
}

impl std::fmt::Display for PointEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PointEvent::IssueCreated => "issue_created",
            PointEvent::IssueDeleted => "issue_deleted",
            PointEvent::VoteReceived => "vote_received",
            PointEvent::VoteRetracted => "vote_retracted",
            PointEvent::IssueVerified => "issue_verified",
            PointEvent::IssueResolved => "issue_resolved",
            PointEvent::CommentPosted => "comment_posted",
            PointEvent::CommentDeleted => "comment_deleted",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversals_cancel_out() {
        assert_eq!(
            PointEvent::IssueCreated.delta() + PointEvent::IssueDeleted.delta(),
            0
        );
        assert_eq!(
            PointEvent::VoteReceived.delta() + PointEvent::VoteRetracted.delta(),
            0
        );
        assert_eq!(
            PointEvent::CommentPosted.delta() + PointEvent::CommentDeleted.delta(),
            0
        );
    }
}
