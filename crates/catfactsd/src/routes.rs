//! API routes for catfactsd
//!
//! JSON command surface over the fact catalog service. Input ranges are
//! checked here and rejected with a 400 and a readable message.

use crate::server::AppState;
use crate::service::HomeSummary;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use catfacts_common::display::time_ago;
use catfacts_common::{Fact, FactFilter, MAX_RATING};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

/// A fact as shown to clients
#[derive(Debug, Clone, Serialize)]
pub struct FactView {
    #[serde(flatten)]
    pub fact: Fact,
    pub time_ago: String,
}

impl From<Fact> for FactView {
    fn from(fact: Fact) -> Self {
        let time_ago = time_ago(&fact.created_at, &Utc::now());
        Self { fact, time_ago }
    }
}

fn views(facts: Vec<Fact>) -> Vec<FactView> {
    facts.into_iter().map(FactView::from).collect()
}

/// Result envelope for commands
#[derive(Debug, Default, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact: Option<FactView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts: Option<Vec<FactView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl CommandResponse {
    fn ok(success: bool) -> Self {
        Self {
            success,
            ..Self::default()
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

fn invalid(message: String) -> Response {
    warn!("  Rejected command: {}", message);
    (StatusCode::BAD_REQUEST, Json(CommandResponse::failed(message))).into_response()
}

// ============================================================================
// Home Routes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub recent_facts: Vec<FactView>,
    pub favorite_facts: Vec<FactView>,
    pub total_count: usize,
    pub average_rating: f64,
}

impl From<HomeSummary> for HomeView {
    fn from(summary: HomeSummary) -> Self {
        Self {
            recent_facts: views(summary.recent_facts),
            favorite_facts: views(summary.favorite_facts),
            total_count: summary.total_count,
            average_rating: summary.average_rating,
        }
    }
}

pub fn home_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/home", get(home))
}

async fn home(State(state): State<AppStateArc>) -> Json<HomeView> {
    Json(state.service.home_summary().await.into())
}

// ============================================================================
// Fetch Routes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FetchManyRequest {
    #[serde(default = "default_fetch_count")]
    pub count: i64,
}

fn default_fetch_count() -> i64 {
    5
}

pub fn fetch_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/facts/fetch", post(fetch_one))
        .route("/v1/facts/fetch-many", post(fetch_many))
}

async fn fetch_one(State(state): State<AppStateArc>) -> Json<CommandResponse> {
    info!("  Fetching a new fact");

    match state.service.fetch_and_save_one().await {
        Some(fact) => Json(CommandResponse {
            success: true,
            fact: Some(fact.into()),
            ..CommandResponse::default()
        }),
        None => Json(CommandResponse::failed("Could not fetch a new fact")),
    }
}

async fn fetch_many(
    State(state): State<AppStateArc>,
    Json(req): Json<FetchManyRequest>,
) -> Response {
    let max = state.max_fetch_per_request;
    let count = match usize::try_from(req.count) {
        Ok(count) if (1..=max).contains(&count) => count,
        _ => return invalid(format!("Fact count must be between 1 and {}", max)),
    };

    info!("  Fetching {} facts", count);
    let saved = state.service.fetch_and_save_many(count).await;

    Json(CommandResponse {
        success: true,
        count: Some(saved.len()),
        facts: Some(views(saved)),
        ..CommandResponse::default()
    })
    .into_response()
}

// ============================================================================
// Fact Routes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
}

pub fn fact_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/facts", get(list_facts))
        .route("/v1/facts/:id", get(get_fact).delete(delete_fact))
        .route("/v1/facts/:id/favorite", post(toggle_favorite))
        .route("/v1/facts/:id/rate", post(rate_fact))
        .route("/v1/categories", get(categories))
}

async fn list_facts(
    State(state): State<AppStateArc>,
    Query(filter): Query<FactFilter>,
) -> Json<Vec<FactView>> {
    Json(views(state.service.filter(filter).await))
}

async fn get_fact(
    State(state): State<AppStateArc>,
    Path(id): Path<i64>,
) -> Result<Json<FactView>, (StatusCode, String)> {
    state
        .service
        .get_fact(id)
        .await
        .map(|fact| Json(fact.into()))
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Fact {} not found", id)))
}

async fn toggle_favorite(
    State(state): State<AppStateArc>,
    Path(id): Path<i64>,
) -> Json<CommandResponse> {
    Json(CommandResponse::ok(state.service.toggle_favorite(id).await))
}

async fn rate_fact(
    State(state): State<AppStateArc>,
    Path(id): Path<i64>,
    Json(req): Json<RateRequest>,
) -> Response {
    let rating = match i32::try_from(req.rating) {
        Ok(rating) if (1..=i32::from(MAX_RATING)).contains(&rating) => rating,
        _ => return invalid(format!("Rating must be between 1 and {}", MAX_RATING)),
    };

    Json(CommandResponse::ok(state.service.rate(id, rating).await)).into_response()
}

async fn delete_fact(
    State(state): State<AppStateArc>,
    Path(id): Path<i64>,
) -> Json<CommandResponse> {
    Json(CommandResponse::ok(state.service.delete(id).await))
}

async fn categories(State(state): State<AppStateArc>) -> Json<Vec<String>> {
    Json(state.service.categories().await)
}

// ============================================================================
// Export Routes
// ============================================================================

pub fn export_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/export", post(export_facts))
}

/// Export as a downloadable text file; the file on disk is removed afterwards
///
/// An empty body exports every fact; anything else must be a valid filter.
async fn export_facts(State(state): State<AppStateArc>, body: Bytes) -> Response {
    let filter = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<FactFilter>(&body) {
            Ok(filter) => Some(filter),
            Err(e) => return invalid(format!("Invalid export filter: {}", e)),
        }
    };

    let path = match state.service.export_to_file(filter).await {
        Ok(path) => path,
        Err(e) => {
            error!("  Export failed: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CommandResponse::failed("Failed to export facts")),
            )
                .into_response();
        }
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("  Failed to read export {}: {}", path.display(), e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CommandResponse::failed("Failed to export facts")),
            )
                .into_response();
        }
    };

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("  Failed to remove export {}: {}", path.display(), e);
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cat_facts_export.txt".to_string());

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub total_facts: usize,
}

#[derive(Debug, Serialize)]
pub struct UpstreamResponse {
    pub available: bool,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/health", get(health_check))
        .route("/v1/upstream", get(upstream_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        total_facts: state.service.total_facts().await,
    })
}

async fn upstream_check(State(state): State<AppStateArc>) -> Json<UpstreamResponse> {
    Json(UpstreamResponse {
        available: state.service.upstream_available().await,
    })
}
