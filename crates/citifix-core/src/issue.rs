//! Issue data model for citifix

use crate::geo::Coordinates;
use crate::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type IssueId = u64;

pub const MAX_TITLE_LEN: usize = 255;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_ADDRESS_LEN: usize = 500;

/// Issue lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Reported,
    Verified,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Reported,
        Status::Verified,
        Status::InProgress,
        Status::Resolved,
        Status::Closed,
    ];

    /// Still awaiting a fix
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Status::Reported | Status::Verified | Status::InProgress
        )
    }
}

impl std::str::FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reported" => Ok(Status::Reported),
            "verified" => Ok(Status::Verified),
            "in_progress" | "in-progress" | "inprogress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            "closed" => Ok(Status::Closed),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Reported => write!(f, "reported"),
            Status::Verified => write!(f, "verified"),
            Status::InProgress => write!(f, "in_progress"),
            Status::Resolved => write!(f, "resolved"),
            Status::Closed => write!(f, "closed"),
        }
    }
}

/// Kind of municipal problem
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pothole,
    BrokenLight,
    IllegalDumping,
    WaterLeak,
    Pollution,
    Graffiti,
    RoadDamage,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Pothole,
        Category::BrokenLight,
        Category::IllegalDumping,
        Category::WaterLeak,
        Category::Pollution,
        Category::Graffiti,
        Category::RoadDamage,
        Category::Other,
    ];

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Pothole => "Pothole",
            Category::BrokenLight => "Broken Street Light",
            Category::IllegalDumping => "Illegal Dumping",
            Category::WaterLeak => "Water Leak",
            Category::Pollution => "Pollution",
            Category::Graffiti => "Graffiti",
            Category::RoadDamage => "Road Damage",
            Category::Other => "Other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pothole" => Ok(Category::Pothole),
            "broken_light" => Ok(Category::BrokenLight),
            "illegal_dumping" => Ok(Category::IllegalDumping),
            "water_leak" => Ok(Category::WaterLeak),
            "pollution" => Ok(Category::Pollution),
            "graffiti" => Ok(Category::Graffiti),
            "road_damage" => Ok(Category::RoadDamage),
            "other" => Ok(Category::Other),
            _ => Err(crate::Error::InvalidCategory(s.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Pothole => "pothole",
            Category::BrokenLight => "broken_light",
            Category::IllegalDumping => "illegal_dumping",
            Category::WaterLeak => "water_leak",
            Category::Pollution => "pollution",
            Category::Graffiti => "graffiti",
            Category::RoadDamage => "road_damage",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// A reported community problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,

    /// Citizen who filed the report
    pub reporter_id: UserId,

    pub title: String,

    pub description: String,

    pub category: Category,

    #[serde(flatten)]
    pub location: Coordinates,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    pub status: Status,

    /// Cached count of live votes
    pub votes_count: u32,

    /// Officer handling the issue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,

    /// Earlier nearby issue this one duplicates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_issue_id: Option<IssueId>,

    pub is_duplicate: bool,

    /// Set when the vote threshold verified the issue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_verified_at: Option<DateTime<Utc>>,

    /// Statuses whose point bonus has already been paid
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub rewarded_statuses: BTreeSet<Status>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn new(id: IssueId, reporter_id: UserId, draft: NewIssue) -> Self {
        let now = Utc::now();
        Self {
            id,
            reporter_id,
            title: draft.title,
            description: draft.description,
            category: draft.category,
            location: draft.location,
            address: draft.address,
            status: Status::Reported,
            votes_count: 0,
            assigned_to: None,
            parent_issue_id: None,
            is_duplicate: false,
            auto_verified_at: None,
            rewarded_statuses: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Link to an earlier issue as its duplicate
    pub fn mark_duplicate_of(&mut self, parent: IssueId) {
        self.parent_issue_id = Some(parent);
        self.is_duplicate = true;
    }

    /// Mark as deleted (soft delete)
    pub fn delete(&mut self) {
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
        self.votes_count = 0;
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} [{}] [{}] {} ({} votes)",
            self.id, self.category, self.status, self.title, self.votes_count
        )
    }
}

/// Validated input for a new issue
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: Coordinates,
    pub address: Option<String>,
}

impl NewIssue {
    pub fn new(
        title: &str,
        description: &str,
        category: Category,
        latitude: f64,
        longitude: f64,
        address: Option<String>,
    ) -> crate::Result<Self> {
        Ok(Self {
            title: validate_title(title)?,
            description: validate_description(description)?,
            category,
            location: Coordinates::new(latitude, longitude)?,
            address: validate_address(address)?,
        })
    }
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    /// `Some(None)` clears the address
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<Status>,
    /// `Some(None)` unassigns
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<UserId>>,
}

impl IssueUpdate {
    /// Touches fields only officers and admins may change
    pub fn is_privileged(&self) -> bool {
        self.status.is_some() || self.assigned_to.is_some()
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn validate_title(title: &str) -> crate::Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(crate::Error::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(crate::Error::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

pub(crate) fn validate_description(description: &str) -> crate::Result<String> {
    let description = description.trim();
    if description.chars().count() < MIN_DESCRIPTION_LEN {
        return Err(crate::Error::Validation(format!(
            "description must be at least {MIN_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(description.to_string())
}

pub(crate) fn validate_address(address: Option<String>) -> crate::Result<Option<String>> {
    match address {
        Some(a) if a.trim().is_empty() => Ok(None),
        Some(a) if a.chars().count() > MAX_ADDRESS_LEN => Err(crate::Error::Validation(format!(
            "address must be at most {MAX_ADDRESS_LEN} characters"
        ))),
        other => Ok(other),
    }
}
