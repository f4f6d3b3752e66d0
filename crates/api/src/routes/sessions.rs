//! Session administration handlers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use engine_core::{CreateSessionRequest, Error, IndexingSession};
use reindex_store::SessionFilter;
use serde::Deserialize;
use tracing::{debug, info};

use crate::extractors::AdminAuth;
use crate::response::{AbortResponse, ApiError};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// POST /indexing-sessions - Start a re-indexing session.
pub async fn create_handler(
    State(state): State<AppState>,
    _auth: AdminAuth,
    body: Bytes,
) -> Result<(StatusCode, Json<IndexingSession>), ApiError> {
    let request: CreateSessionRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let window = request.into_window(Utc::now().timestamp())?;
    let session = state.factory.create(window).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /indexing-sessions - Recent sessions, newest first.
pub async fn list_handler(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<IndexingSession>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let sessions = state.store.list(limit).await?;
    debug!(limit, returned = sessions.len(), "Listed sessions");
    Ok(Json(sessions))
}

/// GET /indexing-sessions/:name_or_id
pub async fn get_handler(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(name_or_id): Path<String>,
) -> Result<Json<IndexingSession>, ApiError> {
    Ok(Json(find(&state, name_or_id).await?))
}

/// POST /indexing-sessions/:name_or_id/abort - Request a cooperative abort.
///
/// The scheduler applies it on its next tick.
pub async fn abort_handler(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(name_or_id): Path<String>,
) -> Result<(StatusCode, Json<AbortResponse>), ApiError> {
    let session = find(&state, name_or_id).await?;
    if session.status.is_terminal() {
        return Err(Error::not_active(format!(
            "session {} is already {}",
            session.name, session.status
        ))
        .into());
    }

    state.abort.request(&session.name).await;
    info!(session = %session.name, status = %session.status, "Abort accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(AbortResponse {
            name: session.name,
            abort_requested: true,
        }),
    ))
}

async fn find(state: &AppState, key: String) -> Result<IndexingSession, Error> {
    state
        .store
        .find_one(&SessionFilter::by_key(key.clone()))
        .await?
        .ok_or_else(|| Error::not_found(format!("session not found: {}", key)))
}
