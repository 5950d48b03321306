//! Transactional JSONL store for citifix
//!
//! All tables live in memory and are persisted as one JSONL file, one
//! tagged record per line. No database server - just a file.
//!
//! Every mutation goes through [`Store::transaction`]: the closure works on
//! a copy of the tables, the copy is written to disk and only then swapped
//! in. An error anywhere leaves both memory and disk untouched.

use crate::comment::{Comment, CommentId};
use crate::config::Config;
use crate::issue::{Issue, IssueId};
use crate::media::{Media, MediaId, MediaOwner};
use crate::notification::{Notification, NotificationEvent};
use crate::points::PointEvent;
use crate::user::{Session, User, UserId};
use crate::vote::{Vote, VoteId};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DATA_FILE: &str = "data.jsonl";
const CONFIG_FILE: &str = "config.toml";
const MEDIA_DIR: &str = "media";

/// Next identifier per table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequences {
    user: u64,
    issue: u64,
    vote: u64,
    comment: u64,
    media: u64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            user: 1,
            issue: 1,
            vote: 1,
            comment: 1,
            media: 1,
        }
    }
}

fn take(seq: &mut u64) -> u64 {
    let id = *seq;
    *seq += 1;
    id
}

/// One line of the data file
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
enum Record {
    Sequences(Sequences),
    User(User),
    Session(Session),
    Issue(Issue),
    Vote(Vote),
    Comment(Comment),
    Media(Media),
    Notification(Notification),
}

/// The full data set
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: BTreeMap<UserId, User>,
    pub sessions: HashMap<String, Session>,
    pub issues: BTreeMap<IssueId, Issue>,
    pub votes: BTreeMap<VoteId, Vote>,
    pub comments: BTreeMap<CommentId, Comment>,
    pub media: BTreeMap<MediaId, Media>,
    pub notifications: HashMap<Uuid, Notification>,
    sequences: Sequences,
    /// Notifications created by the running transaction
    outbox: Vec<Notification>,
}

impl Tables {
    pub fn next_user_id(&mut self) -> UserId {
        take(&mut self.sequences.user)
    }

    pub fn next_issue_id(&mut self) -> IssueId {
        take(&mut self.sequences.issue)
    }

    pub fn next_vote_id(&mut self) -> VoteId {
        take(&mut self.sequences.vote)
    }

    pub fn next_comment_id(&mut self) -> CommentId {
        take(&mut self.sequences.comment)
    }

    pub fn next_media_id(&mut self) -> MediaId {
        take(&mut self.sequences.media)
    }

    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or_else(|| Error::not_found("User", id))
    }

    pub fn user_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("User", id))
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim().to_lowercase();
        self.users.values().find(|u| u.email == email)
    }

    /// A live (not soft-deleted) issue
    pub fn issue(&self, id: IssueId) -> Result<&Issue> {
        self.issues
            .get(&id)
            .filter(|i| !i.is_deleted())
            .ok_or_else(|| Error::not_found("Issue", id))
    }

    pub fn issue_mut(&mut self, id: IssueId) -> Result<&mut Issue> {
        self.issues
            .get_mut(&id)
            .filter(|i| !i.is_deleted())
            .ok_or_else(|| Error::not_found("Issue", id))
    }

    /// All issues that are not soft-deleted
    pub fn live_issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.values().filter(|i| !i.is_deleted())
    }

    /// Comment belonging to `issue_id`
    pub fn comment(&self, issue_id: IssueId, id: CommentId) -> Result<&Comment> {
        self.comments
            .get(&id)
            .filter(|c| c.issue_id == issue_id)
            .ok_or_else(|| Error::not_found("Comment", id))
    }

    pub fn comment_mut(&mut self, issue_id: IssueId, id: CommentId) -> Result<&mut Comment> {
        self.comments
            .get_mut(&id)
            .filter(|c| c.issue_id == issue_id)
            .ok_or_else(|| Error::not_found("Comment", id))
    }

    pub fn vote_of(&self, issue_id: IssueId, user_id: UserId) -> Option<&Vote> {
        self.votes
            .values()
            .find(|v| v.issue_id == issue_id && v.user_id == user_id)
    }

    pub fn votes_for(&self, issue_id: IssueId) -> impl Iterator<Item = &Vote> {
        self.votes.values().filter(move |v| v.issue_id == issue_id)
    }

    pub fn comments_for(&self, issue_id: IssueId) -> impl Iterator<Item = &Comment> {
        self.comments
            .values()
            .filter(move |c| c.issue_id == issue_id)
    }

    pub fn media_for(&self, owner: MediaOwner) -> impl Iterator<Item = &Media> {
        self.media.values().filter(move |m| m.owner == owner)
    }

    pub fn notifications_for(&self, user_id: UserId) -> impl Iterator<Item = &Notification> {
        self.notifications
            .values()
            .filter(move |n| n.user_id == user_id)
    }

    /// Apply a point event to a user's balance
    pub fn award(&mut self, user_id: UserId, event: PointEvent) -> Result<i64> {
        let user = self.user_mut(user_id)?;
        user.points += event.delta();
        tracing::debug!(
            user = user_id,
            event = %event,
            balance = user.points,
            "points adjusted"
        );
        Ok(user.points)
    }

    /// Queue a notification; it is dispatched once the transaction commits
    pub fn notify(&mut self, user_id: UserId, event: NotificationEvent) {
        let notification = Notification::new(user_id, event);
        self.notifications
            .insert(notification.id, notification.clone());
        self.outbox.push(notification);
    }

    /// Remove media rows for an owner, returning their stored paths
    pub fn remove_media_for(&mut self, owner: MediaOwner) -> Vec<String> {
        let ids: Vec<MediaId> = self.media_for(owner).map(|m| m.id).collect();
        ids.into_iter()
            .filter_map(|id| self.media.remove(&id))
            .map(|m| m.file_path)
            .collect()
    }

    fn records(&self) -> impl Iterator<Item = Record> + '_ {
        std::iter::once(Record::Sequences(self.sequences.clone()))
            .chain(self.users.values().cloned().map(Record::User))
            .chain(self.sessions.values().cloned().map(Record::Session))
            .chain(self.issues.values().cloned().map(Record::Issue))
            .chain(self.votes.values().cloned().map(Record::Vote))
            .chain(self.comments.values().cloned().map(Record::Comment))
            .chain(self.media.values().cloned().map(Record::Media))
            .chain(self.notifications.values().cloned().map(Record::Notification))
    }

    fn insert_record(&mut self, record: Record) {
        match record {
            Record::Sequences(s) => self.sequences = s,
            Record::User(u) => {
                self.users.insert(u.id, u);
            }
            Record::Session(s) => {
                self.sessions.insert(s.token_hash.clone(), s);
            }
            Record::Issue(i) => {
                self.issues.insert(i.id, i);
            }
            Record::Vote(v) => {
                self.votes.insert(v.id, v);
            }
            Record::Comment(c) => {
                self.comments.insert(c.id, c);
            }
            Record::Media(m) => {
                self.media.insert(m.id, m);
            }
            Record::Notification(n) => {
                self.notifications.insert(n.id, n);
            }
        }
    }
}

/// Result of a committed transaction
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Notifications to hand to the dispatcher
    pub notifications: Vec<Notification>,
}

/// Data store, optionally backed by a directory
pub struct Store {
    root: Option<PathBuf>,
    tables: Tables,
}

impl Store {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            root: None,
            tables: Tables::default(),
        }
    }

    /// Open an initialized data directory
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join(CONFIG_FILE).exists() {
            return Err(Error::NotInitialized(root.display().to_string()));
        }
        let mut store = Self {
            root: Some(root.to_path_buf()),
            tables: Tables::default(),
        };
        store.load()?;
        Ok(store)
    }

    /// Initialize a new data directory
    pub fn init(root: &Path) -> Result<Self> {
        if root.join(CONFIG_FILE).exists() {
            return Err(Error::AlreadyInitialized(root.display().to_string()));
        }

        fs::create_dir_all(root.join(MEDIA_DIR))?;
        fs::write(root.join(CONFIG_FILE), Config::default_with_comments())?;

        let store = Self {
            root: Some(root.to_path_buf()),
            tables: Tables::default(),
        };
        store.save(&store.tables)?;
        Ok(store)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(CONFIG_FILE))
    }

    /// Directory where uploaded files are kept
    pub fn media_dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(MEDIA_DIR))
    }

    fn data_path(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(DATA_FILE))
    }

    /// Read-only view of the committed state
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Run `f` atomically against the tables
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Tables) -> Result<T>,
    ) -> Result<Committed<T>> {
        let mut draft = self.tables.clone();
        let value = f(&mut draft)?;
        let notifications = std::mem::take(&mut draft.outbox);

        self.save(&draft)?;
        self.tables = draft;

        Ok(Committed {
            value,
            notifications,
        })
    }

    /// Load all records from JSONL
    fn load(&mut self) -> Result<()> {
        let Some(path) = self.data_path() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let reader = BufReader::new(File::open(&path)?);
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                Error::Storage(format!("{}:{}: {}", path.display(), index + 1, e))
            })?;
            self.tables.insert_record(record);
        }

        Ok(())
    }

    /// Write all records to a temp file and move it into place
    fn save(&self, tables: &Tables) -> Result<()> {
        let Some(path) = self.data_path() else {
            return Ok(());
        };
        let tmp = path.with_extension("jsonl.tmp");

        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for record in tables.records() {
                serde_json::to_writer(&mut writer, &record)?;
                writeln!(writer)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Category, NewIssue};
    use crate::user::Role;

    fn add_user(tables: &mut Tables, name: &str) -> UserId {
        let id = tables.next_user_id();
        let user = User::new(
            id,
            name.into(),
            format!("{name}@example.org"),
            String::new(),
            Role::Citizen,
        );
        tables.users.insert(id, user);
        id
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let mut store = Store::in_memory();
        let result: Result<Committed<()>> = store.transaction(|tx| {
            let id = add_user(tx, "ana");
            tx.award(id, PointEvent::IssueCreated)?;
            Err(Error::Other("boom".into()))
        });

        assert!(result.is_err());
        assert!(store.tables().users.is_empty());

        // Sequence was not consumed either
        let committed = store.transaction(|tx| Ok(add_user(tx, "ana"))).unwrap();
        assert_eq!(committed.value, 1);
    }

    #[test]
    fn outbox_is_returned_on_commit() {
        let mut store = Store::in_memory();
        let committed = store
            .transaction(|tx| {
                let id = add_user(tx, "ana");
                tx.notify(
                    id,
                    NotificationEvent::IssueAssigned {
                        issue_id: 1,
                        title: "x".into(),
                    },
                );
                Ok(())
            })
            .unwrap();

        assert_eq!(committed.notifications.len(), 1);
        assert_eq!(store.tables().notifications.len(), 1);
    }

    #[test]
    fn soft_deleted_issues_are_not_found() {
        let mut store = Store::in_memory();
        store
            .transaction(|tx| {
                let reporter = add_user(tx, "ana");
                let id = tx.next_issue_id();
                let draft = NewIssue::new(
                    "Leak",
                    "Water leaking from hydrant",
                    Category::WaterLeak,
                    1.0,
                    1.0,
                    None,
                )?;
                let mut issue = Issue::new(id, reporter, draft);
                issue.delete();
                tx.issues.insert(id, issue);
                Ok(())
            })
            .unwrap();

        assert!(matches!(store.tables().issue(1), Err(Error::NotFound(_))));
        assert_eq!(store.tables().live_issues().count(), 0);
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");

        {
            let mut store = Store::init(&root).unwrap();
            store
                .transaction(|tx| {
                    let id = add_user(tx, "ana");
                    tx.award(id, PointEvent::CommentPosted)?;
                    tx.notify(
                        id,
                        NotificationEvent::IssueAssigned {
                            issue_id: 3,
                            title: "t".into(),
                        },
                    );
                    Ok(())
                })
                .unwrap();
        }

        let mut store = Store::open(&root).unwrap();
        let user = store.tables().user(1).unwrap();
        assert_eq!(user.points, 2);
        assert_eq!(store.tables().notifications_for(1).count(), 1);

        // Sequences survive the reload
        let committed = store.transaction(|tx| Ok(add_user(tx, "bo"))).unwrap();
        assert_eq!(committed.value, 2);
    }

    #[test]
    fn init_twice_fails_and_open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Store::open(dir.path()),
            Err(Error::NotInitialized(_))
        ));
        Store::init(dir.path()).unwrap();
        assert!(matches!(
            Store::init(dir.path()),
            Err(Error::AlreadyInitialized(_))
        ));
    }
}
