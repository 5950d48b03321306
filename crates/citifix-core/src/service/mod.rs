//! Application service
//!
//! Every operation takes the acting user explicitly, runs its writes in a
//! single store transaction, and only after commit performs the side
//! effects that leave the process: notification dispatch and media file
//! removal.

mod accounts;
mod comments;
mod issues;
mod notifications;
mod votes;

pub use accounts::{AuthSession, NewAccount};
pub use comments::CommentView;
pub use issues::{CategoryInfo, CreatedIssue, HeatmapPoint, IssueDetail, IssueQuery, SortBy, SortOrder};
pub use notifications::UnreadNotifications;
pub use votes::{VoteOutcome, VotedIssue, VoterView};

use crate::config::Config;
use crate::issue::{Issue, IssueId};
use crate::media::{storage_path, FsMediaStorage, Media, MediaKind, MediaOwner, MediaStorage, MemoryMediaStorage, Upload};
use crate::notification::{Dispatcher, LogDispatcher, NotificationEvent};
use crate::rules::Transition;
use crate::store::{Store, Tables};
use crate::user::{PublicUser, UserId};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// The citifix application
pub struct Service {
    store: Store,
    config: Config,
    media: Arc<dyn MediaStorage>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Service {
    pub fn new(
        store: Store,
        config: Config,
        media: Arc<dyn MediaStorage>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            store,
            config,
            media,
            dispatcher,
        }
    }

    /// Open an initialized data directory with file storage and log dispatch
    pub fn open(data_dir: &Path) -> Result<Self> {
        let store = Store::open(data_dir)?;
        let config = match store.config_path() {
            Some(path) => Config::load(&path)?,
            None => Config::default(),
        };
        let media_dir = store
            .media_dir()
            .unwrap_or_else(|| data_dir.join("media"));

        Ok(Self::new(
            store,
            config,
            Arc::new(FsMediaStorage::new(media_dir)),
            Arc::new(LogDispatcher),
        ))
    }

    /// Volatile instance, nothing touches disk
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            Store::in_memory(),
            config,
            Arc::new(MemoryMediaStorage::new()),
            Arc::new(LogDispatcher),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Committed state, for read-only projections
    pub fn tables(&self) -> &Tables {
        self.store.tables()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run a transaction, then dispatch the notifications it produced
    fn commit<T>(&mut self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let committed = self.store.transaction(f)?;
        for notification in &committed.notifications {
            self.dispatcher.dispatch(notification);
        }
        Ok(committed.value)
    }

    /// Best-effort removal of stored files
    fn remove_files(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.media.delete(path) {
                tracing::warn!(path = %path, error = %e, "failed to delete media file");
            }
        }
    }

    fn per_page(&self, request: crate::pagination::PageRequest) -> (usize, usize) {
        request.resolve(
            self.config.pagination.default_per_page,
            self.config.pagination.max_per_page,
        )
    }
}

/// Write uploads to storage and record their metadata rows.
///
/// Paths of files already written are pushed to `written` so the caller can
/// remove them if the surrounding transaction fails.
fn attach_uploads(
    tx: &mut Tables,
    storage: &dyn MediaStorage,
    owner: MediaOwner,
    uploads: &[Upload],
    written: &mut Vec<String>,
) -> Result<Vec<Media>> {
    let mut rows = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let path = storage_path(owner, upload);
        storage.put(&path, &upload.bytes)?;
        written.push(path.clone());

        let media = Media {
            id: tx.next_media_id(),
            owner,
            file_path: path,
            file_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            file_size: upload.bytes.len() as u64,
            kind: MediaKind::from_mime(&upload.mime_type),
            created_at: Utc::now(),
        };
        tx.media.insert(media.id, media.clone());
        rows.push(media);
    }
    Ok(rows)
}

/// Notify the reporter about a status change and pay any bonus owed
fn apply_transition(tx: &mut Tables, issue_id: IssueId, transition: Transition) -> Result<()> {
    let issue = tx.issue(issue_id)?;
    let reporter = issue.reporter_id;
    let title = issue.title.clone();

    tx.notify(
        reporter,
        NotificationEvent::StatusChanged {
            issue_id,
            title,
            old_status: transition.from,
            new_status: transition.to,
        },
    );

    if let Some(bonus) = transition.bonus {
        tx.award(reporter, bonus)?;
    }

    tracing::info!(
        issue = issue_id,
        from = %transition.from,
        to = %transition.to,
        bonus = transition.bonus.map(|b| b.delta()).unwrap_or(0),
        "issue status changed"
    );
    Ok(())
}

/// Issue as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub reporter: Option<PublicUser>,
    pub assigned_officer: Option<PublicUser>,
    pub media: Vec<Media>,
    pub comments_count: usize,
    /// Whether the viewing user has a live vote on the issue
    pub user_has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl IssueView {
    pub(crate) fn build(tables: &Tables, issue: &Issue, viewer: UserId) -> Self {
        Self {
            issue: issue.clone(),
            reporter: tables.users.get(&issue.reporter_id).map(|u| u.public()),
            assigned_officer: issue
                .assigned_to
                .and_then(|id| tables.users.get(&id))
                .map(|u| u.public()),
            media: tables
                .media_for(MediaOwner::Issue(issue.id))
                .cloned()
                .collect(),
            comments_count: tables.comments_for(issue.id).count(),
            user_has_voted: tables.vote_of(issue.id, viewer).is_some(),
            distance_km: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::issue::{Category, NewIssue};
    use crate::notification::RecordingDispatcher;
    use crate::user::{Actor, Role};

    pub struct Harness {
        pub service: Service,
        pub media: Arc<MemoryMediaStorage>,
        pub dispatcher: Arc<RecordingDispatcher>,
    }

    impl Harness {
        pub fn new() -> Self {
            let media = Arc::new(MemoryMediaStorage::new());
            let dispatcher = Arc::new(RecordingDispatcher::new());
            let service = Service::new(
                Store::in_memory(),
                Config::default(),
                media.clone(),
                dispatcher.clone(),
            );
            Self {
                service,
                media,
                dispatcher,
            }
        }

        pub fn user(&mut self, name: &str, role: Role) -> Actor {
            let user = self
                .service
                .create_user(name, &format!("{name}@example.org"), "password123", role)
                .unwrap();
            Actor::new(user.id, role)
        }

        pub fn points(&self, actor: &Actor) -> i64 {
            self.service.tables().user(actor.user_id).unwrap().points
        }

        pub fn report(&mut self, actor: &Actor, category: Category, lat: f64, lon: f64) -> IssueId {
            let draft = NewIssue::new(
                "Broken thing",
                "Something on the street needs fixing",
                category,
                lat,
                lon,
                None,
            )
            .unwrap();
            self.service
                .create_issue(actor, draft, Vec::new())
                .unwrap()
                .issue
                .issue
                .id
        }
    }
}
