use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::audit::{AuditEntry, AuditLog};
use crate::catalog::{CatalogError, CatalogStore, InMemoryCatalog, StatusFilter};
use crate::credibility::CredibilityTable;
use crate::dedup::dedup_strict;
use crate::event::Event;
use crate::moderation::{ModerationError, ModerationStats, Moderator};
use crate::pipeline::{BatchReport, Pipeline, PipelineError};
use crate::relevance::{Taxonomy, TaxonomyHandle};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub moderator: Arc<Moderator>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, moderator: Arc<Moderator>) -> Self {
        Self {
            pipeline,
            moderator,
        }
    }

    /// Built-in taxonomy and credibility seeds over an empty in-memory catalog.
    pub fn in_memory() -> Self {
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());
        let pipeline = Pipeline::new(
            TaxonomyHandle::new(Taxonomy::default_seed()),
            Arc::new(CredibilityTable::default_seed()),
            store.clone(),
        );
        let moderator = Arc::new(Moderator::new(store, Arc::new(AuditLog::default())));
        Self::new(pipeline, moderator)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events", get(list_events))
        .route("/events/{id}/audit", get(event_audit))
        .route("/events/{id}/review", post(review))
        .route("/events/{id}/approve", post(approve))
        .route("/events/{id}/reject", post(reject))
        .route("/events/{id}/publish", post(publish))
        .route("/events/{id}/archive", post(archive))
        .route("/moderation/stats", get(stats))
        .route("/discover/text", post(discover_text))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// JSON `{ "error": ... }` with a status code.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        let code = match &e {
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::AlreadyExists(_) | CatalogError::Conflict { .. } => StatusCode::CONFLICT,
            CatalogError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError(code, e.to_string())
    }
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::Catalog(c) => c.into(),
            ModerationError::InvalidTransition { .. } => ApiError(StatusCode::CONFLICT, e.to_string()),
            ModerationError::MissingReason | ModerationError::MissingActor => {
                ApiError(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    }
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    status: String,
}

async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let filter: StatusFilter = q
        .status
        .parse()
        .map_err(|e: String| ApiError(StatusCode::BAD_REQUEST, e))?;
    let events = state.pipeline.store().query(filter).await?;
    Ok(Json(dedup_strict(&events).into_iter().cloned().collect()))
}

async fn event_audit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<AuditEntry>> {
    Json(state.moderator.audit().for_event(&id))
}

#[derive(Deserialize)]
struct ActionReq {
    #[serde(default)]
    actor: String,
    #[serde(default)]
    reason: String,
}

async fn review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionReq>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.moderator.begin_review(&id, &body.actor).await?))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionReq>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.moderator.approve(&id, &body.actor).await?))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionReq>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(
        state
            .moderator
            .reject(&id, &body.actor, &body.reason)
            .await?,
    ))
}

async fn publish(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.moderator.publish(&id).await?))
}

async fn archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionReq>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.moderator.archive(&id, &body.actor).await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<ModerationStats>, ApiError> {
    Ok(Json(state.moderator.stats().await?))
}

#[derive(Deserialize)]
struct DiscoverTextReq {
    text: String,
    #[serde(default = "default_text_source")]
    source_name: String,
}

fn default_text_source() -> String {
    "Manual paste".to_string()
}

async fn discover_text(
    State(state): State<AppState>,
    Json(body): Json<DiscoverTextReq>,
) -> Result<Json<BatchReport>, ApiError> {
    let report = state
        .pipeline
        .ingest_text(&body.source_name, &body.text, Utc::now())
        .await?;
    Ok(Json(report))
}
