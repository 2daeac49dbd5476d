//! Explanation overlay handler

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
};
use neuroscan_core::api::commands;
use neuroscan_core::DiseaseLabel;
use serde::Deserialize;
use validator::Validate;

use crate::{AppError, AppResult, AppState};

/// Strategy that drew the overlay (`placeholder` or `gradcam`)
pub const EXPLANATION_STRATEGY: HeaderName = HeaderName::from_static("x-explanation-strategy");

/// `false` when the overlay does not reflect the model's evidence
pub const CLINICALLY_VALID: HeaderName = HeaderName::from_static("x-clinically-valid");

#[derive(Debug, Deserialize, Validate)]
pub struct ExplainQuery {
    #[validate(length(min = 1, max = 64))]
    pub label: String,
}

/// Overlay for the requested label as PNG; nothing is recorded.
/// Provenance travels in the response headers.
pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ExplainQuery>,
    body: Bytes,
) -> AppResult<Response> {
    query.validate()?;
    let label = DiseaseLabel::parse(&query.label)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown label '{}'", query.label)))?;
    let pipeline = state.pipeline()?;

    let overlay = commands::explain(&pipeline, body.to_vec(), label).await?;
    if !overlay.clinically_valid {
        tracing::debug!("Serving {} overlay for {}; not a clinical explanation", overlay.strategy, label);
    }

    let headers = [
        (header::CONTENT_TYPE, "image/png".to_string()),
        (EXPLANATION_STRATEGY, overlay.strategy.to_string()),
        (CLINICALLY_VALID, overlay.clinically_valid.to_string()),
    ];
    Ok((headers, overlay.png).into_response())
}
