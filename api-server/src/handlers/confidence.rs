//! Confidence categorization

use axum::{
    extract::{Query, State},
    Json,
};
use neuroscan_core::api::commands::{self, ConfidenceResponse};
use serde::Deserialize;
use validator::Validate;

use crate::{AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct ConfidenceQuery {
    #[validate(range(min = 0.0, max = 1.0))]
    pub value: f64,
}

pub async fn categorize(
    State(state): State<AppState>,
    Query(query): Query<ConfidenceQuery>,
) -> AppResult<Json<ConfidenceResponse>> {
    query.validate()?;
    Ok(Json(commands::categorize_confidence(&state.config.pipeline.thresholds, query.value)))
}
