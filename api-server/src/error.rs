//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use neuroscan_core::PipelineError;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Request errors
    #[error("{0}")]
    BadRequest(String),

    // Pipeline errors, mapped by kind
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    // Generic errors
    #[error("{0}")]
    InternalError(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(e) => match e {
                PipelineError::InputError(_) => StatusCode::BAD_REQUEST,
                PipelineError::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::InternalInferenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Pipeline(e) => e.kind(),
            AppError::InternalError(_) => "InternalError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!("{} error: {}", self.kind(), self);
            "Internal server error".to_string()
        } else {
            tracing::debug!("{} error: {}", self.kind(), self);
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(err.to_string())
    }
}
