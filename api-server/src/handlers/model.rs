//! Model status and reload

use axum::{extract::State, Json};
use neuroscan_core::api::commands;
use neuroscan_core::logic::model::EngineStatus;

use crate::{AppResult, AppState};

/// Engine status of the loaded model
pub async fn status(State(state): State<AppState>) -> AppResult<Json<EngineStatus>> {
    let pipeline = state.pipeline()?;
    Ok(Json(commands::get_engine_status(&pipeline)))
}

/// Retry loading the configured model
pub async fn reload(State(state): State<AppState>) -> AppResult<Json<EngineStatus>> {
    tracing::info!("Reloading model from {}", state.config.pipeline.manifest_path.display());
    let status = state.reload_model().await?;
    Ok(Json(status))
}
