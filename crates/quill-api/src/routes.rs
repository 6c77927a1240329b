use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use quill_core::{NoteId, NoteRecord};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::store::{NoteStore, StoreMetricsSnapshot, UpsertOutcome};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    store: Arc<NoteStore>,
}

impl AppState {
    pub fn from_config(config: Arc<ApiConfig>) -> Self {
        Self {
            config,
            store: Arc::new(NoteStore::default()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/healthz", get(healthz))
        .route("/notes", get(list_notes))
        .route("/notes/{id}", axum::routing::put(put_note).delete(delete_note))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    store: StoreMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        store: state.store.metrics_snapshot().await,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    tag: Option<String>,
    collection_id: Option<String>,
}

async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<NoteRecord>> {
    let tag = query.tag.as_deref().map(str::trim).filter(|tag| !tag.is_empty());
    let collection_id = query
        .collection_id
        .as_deref()
        .map(str::trim)
        .filter(|collection| !collection.is_empty());

    let notes = state.store.list(tag, collection_id).await;
    tracing::debug!(endpoint = "list_notes", count = notes.len(), "Listed notes");
    Json(notes)
}

async fn put_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<NoteRecord>,
) -> Result<(StatusCode, Json<NoteRecord>), AppError> {
    let id = parse_id(&id)?;
    if record.id != id {
        return Err(AppError::bad_request(format!(
            "body id {} does not match path id {id}",
            record.id
        )));
    }

    let record = record.normalized();
    if record.title.is_empty() {
        return Err(AppError::unprocessable("title must not be empty"));
    }
    if record.title.chars().count() > state.config.max_title_chars {
        return Err(AppError::unprocessable(format!(
            "title longer than {} characters",
            state.config.max_title_chars
        )));
    }

    let outcome = state.store.upsert(record.clone()).await;
    tracing::info!(
        endpoint = "put_note",
        note_id = %id,
        updated_at = record.updated_at,
        created = outcome == UpsertOutcome::Created,
        "Stored note"
    );
    let status = match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Replaced => StatusCode::OK,
    };
    Ok((status, Json(record)))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    if !state.store.delete(&id).await {
        return Err(AppError::NotFound(id.to_string()));
    }
    tracing::info!(endpoint = "delete_note", note_id = %id, "Deleted note");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(raw: &str) -> Result<NoteId, AppError> {
    raw.parse::<NoteId>()
        .map_err(|_| AppError::bad_request(format!("invalid note id: {raw}")))
}
