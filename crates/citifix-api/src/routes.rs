//! HTTP routes

use crate::app::{
    created, ok, read_uploads, ApiError, ApiResult, AppState, Auth, Form, FromForm, Submission,
};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use citifix_core::comment::CommentId;
use citifix_core::dashboard::DEFAULT_PERIOD_DAYS;
use citifix_core::service::NewAccount;
use citifix_core::{
    BoundingBox, Category, Export, ExportFormat, IssueId, IssueQuery, IssueUpdate, NewIssue,
    PageRequest, Period,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Request to report a new issue
#[derive(Debug, Deserialize)]
struct CreateIssueRequest {
    title: String,
    description: String,
    category: Category,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    address: Option<String>,
}

impl FromForm for CreateIssueRequest {
    fn from_form(form: &Form) -> Result<Self, ApiError> {
        Ok(Self {
            title: form.text("title")?,
            description: form.text("description")?,
            category: form.parse("category")?,
            latitude: form.parse("latitude")?,
            longitude: form.parse("longitude")?,
            address: form.optional("address"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct HeatmapQuery {
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    body: String,
}

impl FromForm for CommentRequest {
    fn from_form(form: &Form) -> Result<Self, ApiError> {
        Ok(Self {
            body: form.text("body")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    #[serde(default)]
    period: Period,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    per_page: Option<usize>,
}

/// `?period=<days>`
#[derive(Debug, Deserialize)]
struct PeriodQuery {
    #[serde(default = "default_period")]
    period: u32,
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    #[serde(default = "default_period")]
    days: u32,
}

#[derive(Debug, Deserialize)]
struct TopReportersQuery {
    #[serde(default = "default_period")]
    period: u32,
    #[serde(default = "default_top_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    format: ExportFormat,
}

fn default_period() -> u32 {
    DEFAULT_PERIOD_DAYS
}

fn default_top_limit() -> usize {
    10
}

fn default_recent_limit() -> usize {
    20
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult {
    // Argon2 runs on the blocking pool, before the write lock.
    let account =
        tokio::task::spawn_blocking(move || NewAccount::new(&req.name, &req.email, &req.password))
            .await
            .map_err(|e| citifix_core::Error::Other(format!("Password hashing failed: {e}")))??;
    let mut service = state.service.write().await;
    Ok(created(service.register_account(account)?))
}

async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> ApiResult {
    let user = state
        .service
        .read()
        .await
        .check_credentials(&req.email, &req.password)?;
    let mut service = state.service.write().await;
    Ok(ok(service.start_session(user.id)?))
}

async fn logout(State(state): State<Arc<AppState>>, auth: Auth) -> ApiResult {
    state.service.write().await.logout(&auth.token)?;
    Ok(ok(serde_json::json!({ "message": "Logged out" })))
}

async fn me(State(state): State<Arc<AppState>>, auth: Auth) -> ApiResult {
    Ok(ok(state.service.read().await.me(&auth.actor)?))
}

async fn list_issues(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(query): Query<IssueQuery>,
) -> ApiResult {
    Ok(ok(state.service.read().await.list_issues(&auth.actor, &query)?))
}

async fn create_issue(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    submission: Submission<CreateIssueRequest>,
) -> ApiResult {
    let req = submission.fields;
    let draft = NewIssue::new(
        &req.title,
        &req.description,
        req.category,
        req.latitude,
        req.longitude,
        req.address,
    )?;
    let mut service = state.service.write().await;
    Ok(created(service.create_issue(&auth.actor, draft, submission.uploads)?))
}

async fn categories(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(ok(state.service.read().await.categories()))
}

async fn my_issues(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state.service.read().await.my_issues(&auth.actor, page)?))
}

async fn heatmap(
    State(state): State<Arc<AppState>>,
    _auth: Auth,
    Query(q): Query<HeatmapQuery>,
) -> ApiResult {
    let bbox = BoundingBox::new(q.min_lat, q.max_lat, q.min_lng, q.max_lng)?;
    Ok(ok(state.service.read().await.heatmap(&bbox)))
}

async fn get_issue(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
) -> ApiResult {
    Ok(ok(state.service.read().await.get_issue(&auth.actor, id)?))
}

async fn update_issue(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
    Json(update): Json<IssueUpdate>,
) -> ApiResult {
    let mut service = state.service.write().await;
    Ok(ok(service.update_issue(&auth.actor, id, update)?))
}

async fn delete_issue(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
) -> ApiResult {
    state.service.write().await.delete_issue(&auth.actor, id)?;
    Ok(ok(serde_json::json!({ "deleted": id })))
}

async fn attach_issue_media(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
    multipart: Multipart,
) -> ApiResult {
    let uploads = read_uploads(multipart).await?;
    let mut service = state.service.write().await;
    Ok(created(service.attach_issue_media(&auth.actor, id, uploads)?))
}

async fn vote(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
) -> ApiResult {
    Ok(ok(state.service.write().await.vote(&auth.actor, id)?))
}

async fn unvote(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
) -> ApiResult {
    Ok(ok(state.service.write().await.unvote(&auth.actor, id)?))
}

async fn voters(
    State(state): State<Arc<AppState>>,
    _auth: Auth,
    Path(id): Path<IssueId>,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state.service.read().await.voters(id, page)?))
}

async fn my_votes(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state.service.read().await.my_votes(&auth.actor, page)?))
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    _auth: Auth,
    Path(id): Path<IssueId>,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state.service.read().await.list_comments(id, page)?))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<IssueId>,
    submission: Submission<CommentRequest>,
) -> ApiResult {
    let mut service = state.service.write().await;
    Ok(created(service.add_comment(
        &auth.actor,
        id,
        &submission.fields.body,
        submission.uploads,
    )?))
}

async fn update_comment(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path((id, comment_id)): Path<(IssueId, CommentId)>,
    Json(req): Json<CommentRequest>,
) -> ApiResult {
    let mut service = state.service.write().await;
    Ok(ok(service.update_comment(&auth.actor, id, comment_id, &req.body)?))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path((id, comment_id)): Path<(IssueId, CommentId)>,
) -> ApiResult {
    state
        .service
        .write()
        .await
        .delete_comment(&auth.actor, id, comment_id)?;
    Ok(ok(serde_json::json!({ "deleted": comment_id })))
}

async fn attach_comment_media(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path((id, comment_id)): Path<(IssueId, CommentId)>,
    multipart: Multipart,
) -> ApiResult {
    let uploads = read_uploads(multipart).await?;
    let mut service = state.service.write().await;
    Ok(created(service.attach_comment_media(
        &auth.actor,
        id,
        comment_id,
        uploads,
    )?))
}

async fn my_comments(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state.service.read().await.my_comments(&auth.actor, page)?))
}

async fn leaderboard(
    State(state): State<Arc<AppState>>,
    _auth: Auth,
    Query(q): Query<LeaderboardQuery>,
) -> ApiResult {
    let page = PageRequest {
        page: q.page,
        per_page: q.per_page,
    };
    Ok(ok(state.service.read().await.leaderboard(q.period, page)))
}

async fn my_rank(State(state): State<Arc<AppState>>, auth: Auth) -> ApiResult {
    Ok(ok(state.service.read().await.my_rank(&auth.actor)?))
}

async fn community_stats(State(state): State<Arc<AppState>>, _auth: Auth) -> ApiResult {
    Ok(ok(state.service.read().await.community_stats()))
}

async fn notifications(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state.service.read().await.notifications(&auth.actor, page)))
}

async fn unread_notifications(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(page): Query<PageRequest>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .unread_notifications(&auth.actor, page)))
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> ApiResult {
    let mut service = state.service.write().await;
    Ok(ok(service.mark_notification_read(&auth.actor, id)?))
}

async fn mark_all_notifications_read(State(state): State<Arc<AppState>>, auth: Auth) -> ApiResult {
    let marked = state
        .service
        .write()
        .await
        .mark_all_notifications_read(&auth.actor)?;
    Ok(ok(serde_json::json!({ "marked": marked })))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> ApiResult {
    state
        .service
        .write()
        .await
        .delete_notification(&auth.actor, id)?;
    Ok(ok(serde_json::json!({ "deleted": id })))
}

async fn delete_all_notifications(State(state): State<Arc<AppState>>, auth: Auth) -> ApiResult {
    let deleted = state
        .service
        .write()
        .await
        .delete_all_notifications(&auth.actor)?;
    Ok(ok(serde_json::json!({ "deleted": deleted })))
}

async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<PeriodQuery>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .dashboard_stats(&auth.actor, q.period)?))
}

async fn issues_trend(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<TrendQuery>,
) -> ApiResult {
    Ok(ok(state.service.read().await.issues_trend(&auth.actor, q.days)?))
}

async fn category_breakdown(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<PeriodQuery>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .category_breakdown(&auth.actor, q.period)?))
}

async fn top_reporters(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<TopReportersQuery>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .top_reporters(&auth.actor, q.period, q.limit)?))
}

async fn location_hotspots(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<PeriodQuery>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .location_hotspots(&auth.actor, q.period)?))
}

async fn officer_performance(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<PeriodQuery>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .officer_performance(&auth.actor, q.period)?))
}

async fn recent_activity(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Query(q): Query<RecentQuery>,
) -> ApiResult {
    Ok(ok(state
        .service
        .read()
        .await
        .recent_activity(&auth.actor, q.limit)?))
}

/// CSV downloads as an attachment; JSON uses the usual envelope
async fn export(
    State(state): State<Arc<AppState>>,
    auth: Auth,
    Json(req): Json<ExportRequest>,
) -> ApiResult {
    let export = state
        .service
        .read()
        .await
        .export(&auth.actor, req.start_date, req.end_date, req.format)?;

    Ok(match export {
        Export::Json(json) => ok(json),
        Export::Csv(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"issues_export.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
    })
}

/// Build the router. `body_limit` caps request bodies, uploads included.
pub fn router(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(me))
        .route("/issues", get(list_issues).post(create_issue))
        .route("/issues/categories", get(categories))
        .route("/issues/my-issues", get(my_issues))
        .route("/issues/heatmap", get(heatmap))
        .route(
            "/issues/{id}",
            get(get_issue).patch(update_issue).delete(delete_issue),
        )
        .route("/issues/{id}/media", post(attach_issue_media))
        .route("/issues/{id}/vote", post(vote).delete(unvote))
        .route("/issues/{id}/voters", get(voters))
        .route(
            "/issues/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/issues/{id}/comments/{comment_id}",
            patch(update_comment).delete(delete_comment),
        )
        .route(
            "/issues/{id}/comments/{comment_id}/media",
            post(attach_comment_media),
        )
        .route("/votes/my-votes", get(my_votes))
        .route("/comments/my-comments", get(my_comments))
        .route("/leaderboard", get(leaderboard))
        .route("/leaderboard/my-rank", get(my_rank))
        .route("/leaderboard/stats", get(community_stats))
        .route(
            "/notifications",
            get(notifications).delete(delete_all_notifications),
        )
        .route("/notifications/unread", get(unread_notifications))
        .route("/notifications/read-all", post(mark_all_notifications_read))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .route(
            "/notifications/{id}",
            axum::routing::delete(delete_notification),
        )
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/dashboard/issues-trend", get(issues_trend))
        .route("/dashboard/category-breakdown", get(category_breakdown))
        .route("/dashboard/top-reporters", get(top_reporters))
        .route("/dashboard/location-hotspots", get(location_hotspots))
        .route("/dashboard/officer-performance", get(officer_performance))
        .route("/dashboard/recent-activity", get(recent_activity))
        .route("/dashboard/export", post(export))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
