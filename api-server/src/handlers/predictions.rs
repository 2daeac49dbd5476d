//! Prediction handler

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use neuroscan_core::api::commands::{self, PredictionResponse};
use validator::Validate;

use super::ImageQuery;
use crate::middleware::session::SessionContext;
use crate::{AppResult, AppState};

/// Classify the raw image body and append the result to the session history
pub async fn create(
    State(state): State<AppState>,
    SessionContext(session): SessionContext,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> AppResult<Json<PredictionResponse>> {
    query.validate()?;
    let pipeline = state.pipeline()?;

    let response = commands::run_prediction(&pipeline, &session, &query.image_name, body.to_vec()).await?;
    Ok(Json(response))
}
