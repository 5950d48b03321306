//! Staff dashboard aggregates and data export
//!
//! Every aggregate is a pure function of the tables and a reference time.
//! The [`Service`] wrappers add the officer/admin check.

use crate::comment::Comment;
use crate::issue::{Category, Issue, Status};
use crate::leaderboard::percent;
use crate::policy;
use crate::service::{IssueView, Service};
use crate::store::Tables;
use crate::user::{Actor, PublicUser, Role, UserId};
use crate::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PERIOD_DAYS: u32 = 30;

const HOTSPOT_LIMIT: usize = 50;
const HOTSPOT_DECIMALS: i32 = 3;

pub const CSV_HEADER: [&str; 11] = [
    "ID",
    "Title",
    "Category",
    "Status",
    "Reporter",
    "Latitude",
    "Longitude",
    "Votes",
    "Comments",
    "Created At",
    "Updated At",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_issues: usize,
    pub open_issues: usize,
    pub resolved_issues: usize,
    pub closed_issues: usize,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub period_days: u32,
    pub new_issues: usize,
    pub resolved_in_period: usize,
    pub active_users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub avg_resolution_time_days: f64,
    pub total_votes: usize,
    pub total_comments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub by_status: BTreeMap<Status, usize>,
    pub by_category: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub overview: Overview,
    pub period_stats: PeriodStats,
    pub performance: Performance,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuesTrend {
    pub period: u32,
    pub trend: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub total: usize,
    pub resolved: usize,
    pub open: usize,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopReporter {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub points: i64,
    pub issues_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub lat: f64,
    pub lng: f64,
    pub category: Category,
    pub issue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfficerPerformance {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub assigned_issues: usize,
    pub resolved_issues: usize,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<PublicUser>,
    pub issue_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub recent_issues: Vec<IssueView>,
    pub recent_comments: Vec<RecentComment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::Validation(format!("invalid export format: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonExport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_issues: usize,
    pub issues: Vec<IssueView>,
}

#[derive(Debug, Clone)]
pub enum Export {
    Json(JsonExport),
    Csv(String),
}

/// Start of a window of `days` ending at `now`. Windows reaching past the
/// representable range start at the earliest instant.
fn since(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn count_status(tables: &Tables, status: Status) -> usize {
    tables.live_issues().filter(|i| i.status == status).count()
}

fn active_users(tables: &Tables, from: DateTime<Utc>) -> usize {
    tables
        .users
        .keys()
        .filter(|id| {
            tables
                .live_issues()
                .any(|i| i.reporter_id == **id && i.created_at >= from)
        })
        .count()
}

/// Mean whole days from report to last update across resolved issues
fn avg_resolution_days(tables: &Tables) -> f64 {
    let days: Vec<i64> = tables
        .live_issues()
        .filter(|i| i.status == Status::Resolved)
        .map(|i| (i.updated_at.date_naive() - i.created_at.date_naive()).num_days())
        .collect();
    if days.is_empty() {
        return 0.0;
    }
    let mean = days.iter().sum::<i64>() as f64 / days.len() as f64;
    (mean * 100.0).round() / 100.0
}

pub fn stats(tables: &Tables, period_days: u32, now: DateTime<Utc>) -> DashboardStats {
    let from = since(now, period_days);
    let total_issues = tables.live_issues().count();
    let resolved_issues = count_status(tables, Status::Resolved);

    let mut by_status = BTreeMap::new();
    let mut categories: BTreeMap<Category, usize> = BTreeMap::new();
    for issue in tables.live_issues() {
        *by_status.entry(issue.status).or_insert(0) += 1;
        *categories.entry(issue.category).or_insert(0) += 1;
    }
    let mut by_category: Vec<CategoryCount> = categories
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

    DashboardStats {
        overview: Overview {
            total_issues,
            open_issues: tables.live_issues().filter(|i| i.status.is_open()).count(),
            resolved_issues,
            closed_issues: count_status(tables, Status::Closed),
            resolution_rate: percent(resolved_issues, total_issues),
        },
        period_stats: PeriodStats {
            period_days,
            new_issues: tables
                .live_issues()
                .filter(|i| i.created_at >= from)
                .count(),
            resolved_in_period: tables
                .live_issues()
                .filter(|i| i.status == Status::Resolved && i.updated_at >= from)
                .count(),
            active_users: active_users(tables, from),
        },
        performance: Performance {
            avg_resolution_time_days: avg_resolution_days(tables),
            total_votes: tables.votes.len(),
            total_comments: tables.comments.len(),
        },
        breakdown: Breakdown {
            by_status,
            by_category,
        },
    }
}

/// New reports per calendar day, oldest day first; empty days are omitted
pub fn issues_trend(tables: &Tables, days: u32, now: DateTime<Utc>) -> IssuesTrend {
    let from = since(now, days);
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for issue in tables.live_issues().filter(|i| i.created_at >= from) {
        *per_day.entry(issue.created_at.date_naive()).or_insert(0) += 1;
    }

    IssuesTrend {
        period: days,
        trend: per_day
            .into_iter()
            .map(|(date, count)| TrendPoint { date, count })
            .collect(),
    }
}

pub fn category_breakdown(tables: &Tables, period_days: u32, now: DateTime<Utc>) -> Vec<CategoryStats> {
    let from = since(now, period_days);
    let mut rows: BTreeMap<Category, (usize, usize, usize)> = BTreeMap::new();
    for issue in tables.live_issues().filter(|i| i.created_at >= from) {
        let row = rows.entry(issue.category).or_default();
        row.0 += 1;
        if issue.status == Status::Resolved {
            row.1 += 1;
        }
        if issue.status.is_open() {
            row.2 += 1;
        }
    }

    let mut breakdown: Vec<CategoryStats> = rows
        .into_iter()
        .map(|(category, (total, resolved, open))| CategoryStats {
            category,
            total,
            resolved,
            open,
            resolution_rate: percent(resolved, total),
        })
        .collect();
    breakdown.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    breakdown
}

/// Users by number of reports within the period
pub fn top_reporters(
    tables: &Tables,
    period_days: u32,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<TopReporter> {
    let from = since(now, period_days);
    let mut reporters: Vec<TopReporter> = tables
        .users
        .values()
        .map(|u| TopReporter {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            points: u.points,
            issues_count: tables
                .live_issues()
                .filter(|i| i.reporter_id == u.id && i.created_at >= from)
                .count(),
        })
        .filter(|r| r.issues_count > 0)
        .collect();
    reporters.sort_by(|a, b| b.issues_count.cmp(&a.issues_count).then_with(|| a.id.cmp(&b.id)));
    reporters.truncate(limit);
    reporters
}

/// Places with repeated reports of one category.
///
/// Coordinates are grouped after rounding to three decimals (roughly 100 m);
/// duplicates do not count.
pub fn location_hotspots(tables: &Tables, period_days: u32, now: DateTime<Utc>) -> Vec<Hotspot> {
    let from = since(now, period_days);
    let scale = 10f64.powi(HOTSPOT_DECIMALS);

    let mut cells: BTreeMap<(i64, i64, Category), usize> = BTreeMap::new();
    for issue in tables
        .live_issues()
        .filter(|i| !i.is_duplicate && i.created_at >= from)
    {
        let (lat, lng) = issue.location.rounded(HOTSPOT_DECIMALS);
        let key = (
            (lat * scale).round() as i64,
            (lng * scale).round() as i64,
            issue.category,
        );
        *cells.entry(key).or_insert(0) += 1;
    }

    let mut hotspots: Vec<Hotspot> = cells
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((lat, lng, category), issue_count)| Hotspot {
            lat: lat as f64 / scale,
            lng: lng as f64 / scale,
            category,
            issue_count,
        })
        .collect();
    hotspots.sort_by(|a, b| b.issue_count.cmp(&a.issue_count));
    hotspots.truncate(HOTSPOT_LIMIT);
    hotspots
}

/// Per officer: currently assigned issues and those resolved in the period
pub fn officer_performance(
    tables: &Tables,
    period_days: u32,
    now: DateTime<Utc>,
) -> Vec<OfficerPerformance> {
    let from = since(now, period_days);
    tables
        .users
        .values()
        .filter(|u| u.role == Role::Officer)
        .map(|u| {
            let assigned: Vec<&Issue> = tables
                .live_issues()
                .filter(|i| i.assigned_to == Some(u.id))
                .collect();
            let resolved = assigned
                .iter()
                .filter(|i| i.status == Status::Resolved && i.updated_at >= from)
                .count();
            OfficerPerformance {
                id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
                assigned_issues: assigned.len(),
                resolved_issues: resolved,
                resolution_rate: percent(resolved, assigned.len()),
            }
        })
        .collect()
}

pub fn recent_activity(tables: &Tables, limit: usize, viewer: UserId) -> RecentActivity {
    let mut issues: Vec<&Issue> = tables.live_issues().collect();
    issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

    let mut comments: Vec<&Comment> = tables.comments.values().collect();
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

    RecentActivity {
        recent_issues: issues
            .into_iter()
            .take(limit)
            .map(|i| IssueView::build(tables, i, viewer))
            .collect(),
        recent_comments: comments
            .into_iter()
            .take(limit)
            .map(|c| RecentComment {
                comment: c.clone(),
                author: tables.users.get(&c.user_id).map(|u| u.public()),
                issue_title: tables.issue(c.issue_id).ok().map(|i| i.title.clone()),
            })
            .collect(),
    }
}

/// Issues created between the two dates, both days included
pub fn issues_between<'a>(
    tables: &'a Tables,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<&'a Issue>> {
    if end < start {
        return Err(Error::Validation(
            "end_date must be on or after start_date".into(),
        ));
    }
    Ok(tables
        .live_issues()
        .filter(|i| {
            let day = i.created_at.date_naive();
            day >= start && day <= end
        })
        .collect())
}

/// Render issues as CSV with a fixed header row
pub fn to_csv(tables: &Tables, issues: &[&Issue]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for issue in issues {
        let reporter = tables
            .users
            .get(&issue.reporter_id)
            .map(|u| u.name.as_str())
            .unwrap_or_default();
        writer.write_record([
            issue.id.to_string(),
            issue.title.clone(),
            issue.category.to_string(),
            issue.status.to_string(),
            reporter.to_string(),
            issue.location.latitude.to_string(),
            issue.location.longitude.to_string(),
            tables.votes_for(issue.id).count().to_string(),
            tables.comments_for(issue.id).count().to_string(),
            issue.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            issue.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("Failed to flush CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(format!("CSV is not UTF-8: {e}")))
}

impl Service {
    pub fn dashboard_stats(&self, actor: &Actor, period_days: u32) -> Result<DashboardStats> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(stats(self.tables(), period_days, Utc::now()))
    }

    pub fn issues_trend(&self, actor: &Actor, days: u32) -> Result<IssuesTrend> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(issues_trend(self.tables(), days, Utc::now()))
    }

    pub fn category_breakdown(&self, actor: &Actor, period_days: u32) -> Result<Vec<CategoryStats>> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(category_breakdown(self.tables(), period_days, Utc::now()))
    }

    pub fn top_reporters(
        &self,
        actor: &Actor,
        period_days: u32,
        limit: usize,
    ) -> Result<Vec<TopReporter>> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(top_reporters(self.tables(), period_days, limit, Utc::now()))
    }

    pub fn location_hotspots(&self, actor: &Actor, period_days: u32) -> Result<Vec<Hotspot>> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(location_hotspots(self.tables(), period_days, Utc::now()))
    }

    pub fn officer_performance(
        &self,
        actor: &Actor,
        period_days: u32,
    ) -> Result<Vec<OfficerPerformance>> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(officer_performance(self.tables(), period_days, Utc::now()))
    }

    pub fn recent_activity(&self, actor: &Actor, limit: usize) -> Result<RecentActivity> {
        policy::can_view_dashboard(actor).into_result()?;
        Ok(recent_activity(self.tables(), limit, actor.user_id))
    }

    pub fn export(
        &self,
        actor: &Actor,
        start: NaiveDate,
        end: NaiveDate,
        format: ExportFormat,
    ) -> Result<Export> {
        policy::can_view_dashboard(actor).into_result()?;
        let tables = self.tables();
        let issues = issues_between(tables, start, end)?;
        tracing::info!(
            user = actor.user_id,
            %start,
            %end,
            count = issues.len(),
            "issues exported"
        );

        match format {
            ExportFormat::Csv => to_csv(tables, &issues).map(Export::Csv),
            ExportFormat::Json => Ok(Export::Json(JsonExport {
                start_date: start,
                end_date: end,
                total_issues: issues.len(),
                issues: issues
                    .into_iter()
                    .map(|i| IssueView::build(tables, i, actor.user_id))
                    .collect(),
            })),
        }
    }
}
