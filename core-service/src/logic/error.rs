//! Pipeline error taxonomy
//!
//! Every per-request failure is reported with a kind the caller can act on.
//! `ModelUnavailable` is the only fatal kind.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// Image could not be decoded or converted to RGB
    #[error("input error: {0}")]
    InputError(String),

    /// Weights missing, corrupt or incompatible at startup
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Unexpected fault during a forward pass
    #[error("internal inference error: {0}")]
    InternalInferenceError(String),

    /// Malformed or incomplete record handed to report generation
    #[error("validation error on `{field}`: {reason}")]
    ValidationError { field: String, reason: String },
}

impl PipelineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Fatal errors mean the session should be aborted, not retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::ModelUnavailable(_))
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InputError(_) => "InputError",
            PipelineError::ModelUnavailable(_) => "ModelUnavailable",
            PipelineError::InternalInferenceError(_) => "InternalInferenceError",
            PipelineError::ValidationError { .. } => "ValidationError",
        }
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::InputError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_model_unavailable_is_fatal() {
        assert!(PipelineError::ModelUnavailable("missing".into()).is_fatal());
        assert!(!PipelineError::InputError("bad".into()).is_fatal());
        assert!(!PipelineError::InternalInferenceError("boom".into()).is_fatal());
        assert!(!PipelineError::validation("confidence", "missing").is_fatal());
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = PipelineError::validation("image_name", "missing");
        assert_eq!(err.kind(), "ValidationError");
        assert!(err.to_string().contains("image_name"));
    }
}
