//! Points ranking and community totals

use crate::issue::Status;
use crate::pagination::{Page, PageRequest};
use crate::service::Service;
use crate::store::Tables;
use crate::user::{Actor, PublicUser, User, UserId};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const LEADERBOARD_PER_PAGE: usize = 20;

/// Activity window for the leaderboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    AllTime,
    Month,
    Week,
}

impl Period {
    /// Earliest issue creation time that counts as activity
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::AllTime => None,
            Period::Month => Some(now - Duration::days(30)),
            Period::Week => Some(now - Duration::days(7)),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all_time" | "all" => Ok(Period::AllTime),
            "month" => Ok(Period::Month),
            "week" => Ok(Period::Week),
            _ => Err(Error::Validation(format!("invalid period: {s}"))),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::AllTime => write!(f, "all_time"),
            Period::Month => write!(f, "month"),
            Period::Week => write!(f, "week"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub user: PublicUser,
    pub issues_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MyRank {
    pub user: PublicUser,
    pub rank: usize,
    pub total_users: usize,
    pub points: i64,
    pub issues_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityStats {
    pub total_issues: usize,
    pub resolved_issues: usize,
    /// Users who reported something in the last 30 days
    pub active_users: usize,
    pub total_votes: usize,
    /// Percent, two decimals
    pub resolution_rate: f64,
}

/// Points descending, then the older account first
fn by_points(a: &User, b: &User) -> Ordering {
    b.points.cmp(&a.points).then_with(|| a.id.cmp(&b.id))
}

fn issues_count(tables: &Tables, user: UserId) -> usize {
    tables
        .live_issues()
        .filter(|i| i.reporter_id == user)
        .count()
}

fn reported_since(tables: &Tables, user: UserId, since: DateTime<Utc>) -> bool {
    tables
        .live_issues()
        .any(|i| i.reporter_id == user && i.created_at >= since)
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

/// Users with a positive balance in rank order, restricted to those active
/// within `period`
pub fn ranking(tables: &Tables, period: Period, now: DateTime<Utc>) -> Vec<LeaderboardEntry> {
    let since = period.since(now);
    let mut users: Vec<&User> = tables
        .users
        .values()
        .filter(|u| u.points > 0)
        .filter(|u| since.is_none_or(|since| reported_since(tables, u.id, since)))
        .collect();
    users.sort_by(|a, b| by_points(a, b));

    users
        .into_iter()
        .enumerate()
        .map(|(index, user)| LeaderboardEntry {
            rank: index + 1,
            user: user.public(),
            issues_count: issues_count(tables, user.id),
        })
        .collect()
}

/// Where a user stands among every account
pub fn rank_of(tables: &Tables, user_id: UserId) -> Result<MyRank> {
    let user = tables.user(user_id)?;
    let mut users: Vec<&User> = tables.users.values().collect();
    users.sort_by(|a, b| by_points(a, b));
    let rank = users
        .iter()
        .position(|u| u.id == user_id)
        .map(|p| p + 1)
        .ok_or_else(|| Error::not_found("User", user_id))?;

    Ok(MyRank {
        user: user.public(),
        rank,
        total_users: tables.users.values().filter(|u| u.points > 0).count(),
        points: user.points,
        issues_count: issues_count(tables, user_id),
    })
}

pub fn community_stats(tables: &Tables, now: DateTime<Utc>) -> CommunityStats {
    let total_issues = tables.live_issues().count();
    let resolved_issues = tables
        .live_issues()
        .filter(|i| i.status == Status::Resolved)
        .count();
    let month_ago = now - Duration::days(30);
    let active_users = tables
        .users
        .values()
        .filter(|u| reported_since(tables, u.id, month_ago))
        .count();

    CommunityStats {
        total_issues,
        resolved_issues,
        active_users,
        total_votes: tables.votes.len(),
        resolution_rate: percent(resolved_issues, total_issues),
    }
}

impl Service {
    pub fn leaderboard(&self, period: Period, page: PageRequest) -> Page<LeaderboardEntry> {
        let (page, per_page) =
            page.resolve(LEADERBOARD_PER_PAGE, self.config().pagination.max_per_page);
        Page::slice(ranking(self.tables(), period, Utc::now()), page, per_page)
    }

    pub fn my_rank(&self, actor: &Actor) -> Result<MyRank> {
        rank_of(self.tables(), actor.user_id)
    }

    pub fn community_stats(&self) -> CommunityStats {
        community_stats(self.tables(), Utc::now())
    }
}
