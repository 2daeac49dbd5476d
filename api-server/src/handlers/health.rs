//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_loaded: bool,
    active_sessions: usize,
    uptime_seconds: i64,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.model_loaded();
    let now = chrono::Utc::now();
    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        model_loaded,
        active_sessions: state.sessions.len(),
        uptime_seconds: (now - state.started_at()).num_seconds(),
        timestamp: now.timestamp(),
    })
}
