//! Session handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use neuroscan_core::api::commands;
use neuroscan_core::HistoryEntry;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::session::SessionContext;
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Start a new session with an empty history
pub async fn create(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let session = state.sessions.create();
    tracing::info!("Session {} created", session.id());
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            id: session.id(),
            started_at: session.started_at(),
        }),
    )
}

/// End a session; its history is discarded
pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    state.sessions.remove(id)?;
    tracing::info!("Session {} ended", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn history(SessionContext(session): SessionContext) -> Json<Vec<HistoryEntry>> {
    Json(commands::get_prediction_history(&session))
}
