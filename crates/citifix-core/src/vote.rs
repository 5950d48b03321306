//! Vote ledger rows

use crate::issue::IssueId;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type VoteId = u64;

/// One citizen endorsement, unique per (issue, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(id: VoteId, issue_id: IssueId, user_id: UserId) -> Self {
        Self {
            id,
            issue_id,
            user_id,
            created_at: Utc::now(),
        }
    }
}
