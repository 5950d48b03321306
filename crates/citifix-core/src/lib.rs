//! citifix-core: Core library for the citifix issue reporting platform
//!
//! Citizens report municipal problems at a location, vote and comment;
//! officers triage and resolve them. Reports near an existing one of the
//! same category are linked as duplicates, enough votes verify a report on
//! its own, and every contribution moves a points balance that feeds a
//! leaderboard. State lives in a transactional JSONL store.

pub mod comment;
pub mod config;
pub mod dashboard;
pub mod duplicates;
pub mod error;
pub mod geo;
pub mod issue;
pub mod leaderboard;
pub mod media;
pub mod notification;
pub mod pagination;
pub mod points;
pub mod policy;
pub mod rules;
pub mod service;
pub mod store;
pub mod token;
pub mod user;
pub mod vote;

pub use config::Config;
pub use dashboard::{Export, ExportFormat};
pub use error::Error;
pub use geo::{BoundingBox, Coordinates};
pub use issue::{Category, Issue, IssueId, IssueUpdate, NewIssue, Status};
pub use leaderboard::Period;
pub use media::{FsMediaStorage, Media, MediaStorage, MemoryMediaStorage, Upload};
pub use notification::{Dispatcher, LogDispatcher, Notification, NotificationEvent};
pub use pagination::{Page, PageRequest};
pub use service::{IssueQuery, IssueView, Service};
pub use store::Store;
pub use user::{Actor, PublicUser, Role, User, UserId};

/// Result type for citifix operations
pub type Result<T> = std::result::Result<T, Error>;
