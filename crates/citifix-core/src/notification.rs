//! Notification inbox rows and delivery
//!
//! Rows are written in the same transaction as the change that caused them.
//! After commit the service hands them to a [`Dispatcher`] for delivery.

use crate::comment::CommentId;
use crate::issue::{IssueId, Status};
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    IssueAssigned {
        issue_id: IssueId,
        title: String,
    },
    StatusChanged {
        issue_id: IssueId,
        title: String,
        old_status: Status,
        new_status: Status,
    },
    NewComment {
        issue_id: IssueId,
        title: String,
        comment_id: CommentId,
        commenter_id: UserId,
    },
}

impl NotificationEvent {
    /// One-line text for mail subjects and logs
    pub fn message(&self) -> String {
        match self {
            NotificationEvent::IssueAssigned { issue_id, title } => {
                format!("Issue #{issue_id} \"{title}\" has been assigned to you")
            }
            NotificationEvent::StatusChanged {
                issue_id,
                title,
                old_status,
                new_status,
            } => format!(
                "Issue #{issue_id} \"{title}\" changed from {old_status} to {new_status}"
            ),
            NotificationEvent::NewComment {
                issue_id, title, ..
            } => format!("New comment on issue #{issue_id} \"{title}\""),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::IssueAssigned { .. } => "issue_assigned",
            NotificationEvent::StatusChanged { .. } => "status_changed",
            NotificationEvent::NewComment { .. } => "new_comment",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub data: NotificationEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: UserId, data: NotificationEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            data,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn mark_read(&mut self) {
        if self.read_at.is_none() {
            self.read_at = Some(Utc::now());
        }
    }
}

/// Delivery collaborator (mail, push, queue); retries are its business
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, notification: &Notification);
}

/// Emits one tracing event per notification
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn dispatch(&self, notification: &Notification) {
        tracing::info!(
            recipient = notification.user_id,
            kind = notification.data.kind(),
            id = %notification.id,
            "{}",
            notification.data.message()
        );
    }
}

/// Keeps dispatched notifications, for inspection
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, notification: &Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
    }
}
