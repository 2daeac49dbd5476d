//! Pipeline configuration
//!
//! Read once at startup from environment variables. Every value has a
//! default so a bare environment gives a working placeholder setup.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MANIFEST_PATH, DEFAULT_SESSION_POOL};
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::explain::ExplanationKind;
use crate::logic::model::ConfidenceThresholds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model manifest; weights path inside it is relative to this file
    pub manifest_path: PathBuf,

    /// Number of ONNX Runtime sessions over the shared weights
    pub session_pool: usize,

    pub thresholds: ConfidenceThresholds,

    pub explanation: ExplanationKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            session_pool: DEFAULT_SESSION_POOL,
            thresholds: ConfidenceThresholds::default(),
            explanation: ExplanationKind::Placeholder,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` over an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        let defaults = Self::default();

        let config = Self {
            manifest_path: lookup("MODEL_MANIFEST")
                .map(PathBuf::from)
                .unwrap_or(defaults.manifest_path),

            session_pool: parse_or(&lookup, "ONNX_SESSIONS", defaults.session_pool)?,

            thresholds: ConfidenceThresholds {
                high: parse_or(&lookup, "CONFIDENCE_HIGH", defaults.thresholds.high)?,
                moderate: parse_or(&lookup, "CONFIDENCE_MODERATE", defaults.thresholds.moderate)?,
            },

            explanation: match lookup("EXPLANATION_STRATEGY") {
                Some(raw) => raw.parse()?,
                None => defaults.explanation,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.session_pool == 0 {
            return Err(PipelineError::validation("ONNX_SESSIONS", "must be at least 1"));
        }
        self.thresholds.validate()
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> PipelineResult<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::validation(key, format!("cannot parse '{}'", raw))),
    }
}
