use super::Service;
use crate::notification::Notification;
use crate::pagination::{Page, PageRequest};
use crate::store::Tables;
use crate::user::Actor;
use crate::{Error, Result};
use serde::Serialize;
use uuid::Uuid;

const NOTIFICATIONS_PER_PAGE: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct UnreadNotifications {
    pub notifications: Page<Notification>,
    pub unread_count: usize,
}

/// The actor's notifications, newest first
fn inbox<'a>(tables: &'a Tables, actor: &Actor) -> Vec<&'a Notification> {
    let mut items: Vec<&Notification> = tables.notifications_for(actor.user_id).collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    items
}

/// Owned notification, or NotFound so other users learn nothing
fn owned(tables: &Tables, actor: &Actor, id: Uuid) -> Result<()> {
    match tables.notifications.get(&id) {
        Some(n) if n.user_id == actor.user_id => Ok(()),
        _ => Err(Error::not_found("Notification", id)),
    }
}

impl Service {
    pub fn notifications(&self, actor: &Actor, page: PageRequest) -> Page<Notification> {
        let (page, per_page) =
            page.resolve(NOTIFICATIONS_PER_PAGE, self.config.pagination.max_per_page);
        let items = inbox(self.tables(), actor).into_iter().cloned().collect();
        Page::slice(items, page, per_page)
    }

    pub fn unread_notifications(&self, actor: &Actor, page: PageRequest) -> UnreadNotifications {
        let (page, per_page) =
            page.resolve(NOTIFICATIONS_PER_PAGE, self.config.pagination.max_per_page);
        let unread: Vec<Notification> = inbox(self.tables(), actor)
            .into_iter()
            .filter(|n| !n.is_read())
            .cloned()
            .collect();

        UnreadNotifications {
            unread_count: unread.len(),
            notifications: Page::slice(unread, page, per_page),
        }
    }

    pub fn mark_notification_read(&mut self, actor: &Actor, id: Uuid) -> Result<Notification> {
        self.commit(|tx| {
            owned(tx, actor, id)?;
            let notification = tx
                .notifications
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("Notification", id))?;
            notification.mark_read();
            Ok(notification.clone())
        })
    }

    /// Returns how many were newly marked
    pub fn mark_all_notifications_read(&mut self, actor: &Actor) -> Result<usize> {
        self.commit(|tx| {
            let mut marked = 0;
            for n in tx.notifications.values_mut() {
                if n.user_id == actor.user_id && !n.is_read() {
                    n.mark_read();
                    marked += 1;
                }
            }
            Ok(marked)
        })
    }

    pub fn delete_notification(&mut self, actor: &Actor, id: Uuid) -> Result<()> {
        self.commit(|tx| {
            owned(tx, actor, id)?;
            tx.notifications.remove(&id);
            Ok(())
        })
    }

    /// Returns how many were removed
    pub fn delete_all_notifications(&mut self, actor: &Actor) -> Result<usize> {
        self.commit(|tx| {
            let before = tx.notifications.len();
            tx.notifications.retain(|_, n| n.user_id != actor.user_id);
            Ok(before - tx.notifications.len())
        })
    }

    /// Drop the actor's already-read notifications
    pub(crate) fn purge_read_notifications(&mut self, actor: &Actor) -> Result<usize> {
        self.commit(|tx| {
            let before = tx.notifications.len();
            tx.notifications
                .retain(|_, n| n.user_id != actor.user_id || !n.is_read());
            Ok(before - tx.notifications.len())
        })
    }
}
