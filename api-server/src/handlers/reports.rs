//! Report download

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use neuroscan_core::api::commands;
use validator::Validate;

use super::ImageQuery;
use crate::middleware::session::SessionContext;
use crate::{AppResult, AppState};

/// Classify, explain and return the PDF report as an attachment
pub async fn create(
    State(state): State<AppState>,
    SessionContext(session): SessionContext,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> AppResult<Response> {
    query.validate()?;
    let pipeline = state.pipeline()?;

    let (prediction, report) =
        commands::predict_with_report(&pipeline, &session, &query.image_name, body.to_vec()).await?;

    tracing::debug!(
        "Report for record {} ({} bytes)",
        prediction.record_id,
        report.bytes.len()
    );

    let headers = [
        (header::CONTENT_TYPE, report.mime.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", report.filename),
        ),
    ];
    Ok((headers, report.bytes).into_response())
}
