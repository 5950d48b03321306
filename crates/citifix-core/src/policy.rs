//! Authorization policy
//!
//! One evaluation function per privileged operation. Each returns a
//! [`Decision`] carrying the reason for a denial.

use crate::comment::Comment;
use crate::issue::{Issue, IssueUpdate, Status};
use crate::user::Actor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    fn deny(reason: &str) -> Self {
        Decision::Deny(reason.to_string())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into `Error::Forbidden`
    pub fn into_result(self) -> crate::Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(crate::Error::Forbidden(reason)),
        }
    }
}

fn is_reporter(actor: &Actor, issue: &Issue) -> bool {
    actor.user_id == issue.reporter_id
}

/// Only officers and admins move issues through the lifecycle
pub fn can_transition_status(actor: &Actor, _issue: &Issue, _next: Status) -> Decision {
    if actor.is_staff() {
        Decision::Allow
    } else {
        Decision::deny("only officers and admins can change status")
    }
}

pub fn can_assign(actor: &Actor, _issue: &Issue) -> Decision {
    if actor.is_staff() {
        Decision::Allow
    } else {
        Decision::deny("only officers and admins can change assignment")
    }
}

/// Reporter edits content; staff edit content, status and assignment
pub fn can_update_issue(actor: &Actor, issue: &Issue, update: &IssueUpdate) -> Decision {
    if !actor.is_staff() && !is_reporter(actor, issue) {
        return Decision::deny("unauthorized to update this issue");
    }
    if let Some(next) = update.status {
        let decision = can_transition_status(actor, issue, next);
        if !decision.is_allowed() {
            return decision;
        }
    }
    if update.assigned_to.is_some() {
        return can_assign(actor, issue);
    }
    Decision::Allow
}

pub fn can_delete_issue(actor: &Actor, issue: &Issue) -> Decision {
    if actor.is_admin() || is_reporter(actor, issue) {
        Decision::Allow
    } else {
        Decision::deny("unauthorized to delete this issue")
    }
}

pub fn can_attach_issue_media(actor: &Actor, issue: &Issue) -> Decision {
    if actor.is_staff() || is_reporter(actor, issue) {
        Decision::Allow
    } else {
        Decision::deny("unauthorized to add media to this issue")
    }
}

/// Only the author edits a comment, including its attachments
pub fn can_edit_comment(actor: &Actor, comment: &Comment) -> Decision {
    if actor.user_id == comment.user_id {
        Decision::Allow
    } else {
        Decision::deny("unauthorized to update this comment")
    }
}

pub fn can_delete_comment(actor: &Actor, comment: &Comment) -> Decision {
    if actor.user_id == comment.user_id || actor.is_admin() {
        Decision::Allow
    } else {
        Decision::deny("unauthorized to delete this comment")
    }
}

pub fn can_view_dashboard(actor: &Actor) -> Decision {
    if actor.is_staff() {
        Decision::Allow
    } else {
        Decision::deny("dashboard is restricted to officers and admins")
    }
}

pub fn can_manage_roles(actor: &Actor) -> Decision {
    if actor.is_admin() {
        Decision::Allow
    } else {
        Decision::deny("only admins can change roles")
    }
}
