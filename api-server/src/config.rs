//! Configuration module

use std::env;

use neuroscan_core::constants::MAX_IMAGE_BYTES;
use neuroscan_core::{PipelineConfig, PipelineResult};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Request body limit for image uploads
    pub max_upload_bytes: usize,

    /// Model, thresholds and explanation strategy
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: "development".to_string(),
            max_upload_bytes: MAX_IMAGE_BYTES,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),

            pipeline: PipelineConfig::from_env()?,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
