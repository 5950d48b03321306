//! CLI command implementations

use anyhow::{Context, Result};
use chrono::NaiveDate;
use citifix_core::config::data_dir;
use citifix_core::service::IssueDetail;
use citifix_core::{
    Actor, Category, Export, ExportFormat, IssueQuery, Period, PageRequest, Role, Service, Status,
    Store,
};
use colored::Colorize;
use std::path::Path;
use tabled::{Table, Tabled};

/// Local operator. Full access, never matches a stored account.
fn operator() -> Actor {
    Actor::new(0, Role::Admin)
}

fn open(dir: Option<&Path>) -> Result<Service> {
    let dir = data_dir(dir)?;
    Service::open(&dir).with_context(|| format!("Failed to open {}", dir.display()))
}

fn colored_status(status: Status) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        Status::Reported => label.white(),
        Status::Verified => label.cyan(),
        Status::InProgress => label.yellow(),
        Status::Resolved => label.green(),
        Status::Closed => label.dimmed(),
    }
}

#[derive(Tabled)]
struct UserRow {
    id: u64,
    name: String,
    email: String,
    role: Role,
    points: i64,
}

#[derive(Tabled)]
struct IssueRow {
    id: u64,
    status: Status,
    category: Category,
    votes: u32,
    title: String,
}

#[derive(Tabled)]
struct RankRow {
    rank: usize,
    name: String,
    points: i64,
    issues: usize,
}

pub fn init(dir: Option<&Path>) -> Result<()> {
    let dir = data_dir(dir)?;
    Store::init(&dir)?;
    println!("{} Initialized citifix in {}", "✓".green(), dir.display());
    Ok(())
}

pub fn user_add(
    dir: Option<&Path>,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    json: bool,
) -> Result<()> {
    let mut service = open(dir)?;
    let user = service.create_user(name, email, password, role)?;

    if json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!("{} Created user #{}: {}", "✓".green(), user.id, user.email);
        println!("  Role: {}", user.role);
    }
    Ok(())
}

pub fn user_role(dir: Option<&Path>, id: u64, role: Role, json: bool) -> Result<()> {
    let mut service = open(dir)?;
    let user = service.assign_role(id, role)?;

    if json {
        println!("{}", serde_json::to_string(&user)?);
    } else {
        println!("{} {} is now {}", "✓".green(), user.email, user.role);
    }
    Ok(())
}

pub fn user_list(dir: Option<&Path>, json: bool) -> Result<()> {
    let service = open(dir)?;
    let users: Vec<_> = service.tables().users.values().map(|u| u.public()).collect();

    if json {
        println!("{}", serde_json::to_string(&users)?);
    } else if users.is_empty() {
        println!("No users found");
    } else {
        let rows = users.into_iter().map(|u| UserRow {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            points: u.points,
        });
        println!("{}", Table::new(rows));
    }
    Ok(())
}

pub fn list(
    dir: Option<&Path>,
    status: Option<Status>,
    category: Option<Category>,
    duplicates: bool,
    page: usize,
    json: bool,
) -> Result<()> {
    let service = open(dir)?;
    let query = IssueQuery {
        status,
        category,
        include_duplicates: duplicates,
        page: Some(page),
        ..Default::default()
    };
    let issues = service.list_issues(&operator(), &query)?;

    if json {
        println!("{}", serde_json::to_string(&issues)?);
    } else if issues.data.is_empty() {
        println!("No issues found");
    } else {
        let rows = issues.data.iter().map(|v| IssueRow {
            id: v.issue.id,
            status: v.issue.status,
            category: v.issue.category,
            votes: v.issue.votes_count,
            title: v.issue.title.clone(),
        });
        println!("{}", Table::new(rows));
        println!(
            "Page {}/{} ({} issues)",
            issues.current_page, issues.last_page, issues.total
        );
    }
    Ok(())
}

pub fn show(dir: Option<&Path>, id: u64, json: bool) -> Result<()> {
    let service = open(dir)?;
    let detail = service.get_issue(&operator(), id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_detail(&detail);
    }
    Ok(())
}

fn print_detail(detail: &IssueDetail) {
    let view = &detail.view;
    let issue = &view.issue;
    println!("{} {}", format!("#{}", issue.id).cyan().bold(), issue.title.bold());
    println!();
    println!("Status:   {}", colored_status(issue.status));
    println!("Category: {}", issue.category.label());
    println!(
        "Location: {:.6}, {:.6}",
        issue.location.latitude, issue.location.longitude
    );
    if let Some(ref address) = issue.address {
        println!("Address:  {}", address);
    }
    if let Some(ref reporter) = view.reporter {
        println!("Reporter: {} <{}>", reporter.name, reporter.email);
    }
    if let Some(ref officer) = view.assigned_officer {
        println!("Assigned: {}", officer.name);
    }
    println!("Votes:    {}", issue.votes_count);
    println!("Comments: {}", view.comments_count);
    println!("Created:  {}", issue.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:  {}", issue.updated_at.format("%Y-%m-%d %H:%M"));

    println!();
    println!("{}", "Description:".bold());
    println!("{}", issue.description);

    if let Some(ref parent) = detail.parent_issue {
        println!();
        println!("{} {}", "Duplicate of:".bold(), parent);
    }
    if !detail.duplicates.is_empty() {
        println!();
        println!("{}", "Duplicates:".bold());
        for dup in &detail.duplicates {
            println!("  {}", dup);
        }
    }
    if !view.media.is_empty() {
        println!();
        println!("{}", "Media:".bold());
        for media in &view.media {
            println!("  {} ({} bytes)", media.file_name, media.file_size);
        }
    }
}

pub fn leaderboard(dir: Option<&Path>, period: Period, json: bool) -> Result<()> {
    let service = open(dir)?;
    let board = service.leaderboard(period, PageRequest::default());

    if json {
        println!("{}", serde_json::to_string(&board)?);
    } else if board.data.is_empty() {
        println!("Nobody has earned points yet ({})", period);
    } else {
        let rows = board.data.into_iter().map(|e| RankRow {
            rank: e.rank,
            name: e.user.name,
            points: e.user.points,
            issues: e.issues_count,
        });
        println!("{}", Table::new(rows));
    }
    Ok(())
}

pub fn stats(dir: Option<&Path>, days: u32, json: bool) -> Result<()> {
    let service = open(dir)?;
    let stats = service.dashboard_stats(&operator(), days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let o = &stats.overview;
    println!("{}", "Overview".bold());
    println!("  Total:      {}", o.total_issues);
    println!("  Open:       {}", o.open_issues);
    println!("  Resolved:   {}", o.resolved_issues);
    println!("  Closed:     {}", o.closed_issues);
    println!("  Resolution: {:.2}%", o.resolution_rate);

    let p = &stats.period_stats;
    println!();
    println!("{}", format!("Last {} days", p.period_days).bold());
    println!("  New issues:   {}", p.new_issues);
    println!("  Resolved:     {}", p.resolved_in_period);
    println!("  Active users: {}", p.active_users);

    let perf = &stats.performance;
    println!();
    println!("{}", "Performance".bold());
    println!("  Avg resolution: {:.2} days", perf.avg_resolution_time_days);
    println!("  Votes:          {}", perf.total_votes);
    println!("  Comments:       {}", perf.total_comments);

    println!();
    println!("{}", "By status".bold());
    for (status, count) in &stats.breakdown.by_status {
        println!("  {:<12} {}", colored_status(*status), count);
    }
    Ok(())
}

pub fn export(
    dir: Option<&Path>,
    start: NaiveDate,
    end: NaiveDate,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let service = open(dir)?;
    let body = match service.export(&operator(), start, end, format)? {
        Export::Json(json) => serde_json::to_string_pretty(&json)?,
        Export::Csv(csv) => csv,
    };

    match output {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Exported to {}", "✓".green(), path.display());
        }
        None => print!("{}", body),
    }
    Ok(())
}
