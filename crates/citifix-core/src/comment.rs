//! Comments on issues

use crate::issue::IssueId;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CommentId = u64;

pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(id: CommentId, issue_id: IssueId, user_id: UserId, body: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            issue_id,
            user_id,
            body,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn edit(&mut self, body: String) {
        self.body = body;
        self.updated_at = Utc::now();
    }
}

/// Accepts 1 to 1000 characters after trimming
pub fn validate_body(body: &str) -> crate::Result<String> {
    let body = body.trim();
    let len = body.chars().count();
    if len == 0 || len > MAX_COMMENT_LEN {
        return Err(crate::Error::Validation(format!(
            "comment must be between 1 and {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(body.to_string())
}
