//! Shared application state
//!
//! The pipeline slot is empty while the model is unavailable; the server
//! keeps serving health and session routes and answers inference with 503.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use neuroscan_core::logic::model::EngineStatus;
use neuroscan_core::{InferencePipeline, PipelineError, Session};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

// ============================================================================
// SESSION STORE
// ============================================================================

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
}

impl SessionStore {
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.write().insert(session.id(), session.clone());
        session
    }

    pub fn get(&self, id: Uuid) -> AppResult<Arc<Session>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }

    /// Drops the session and its history
    pub fn remove(&self, id: Uuid) -> AppResult<()> {
        self.sessions
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

// ============================================================================
// APP STATE
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pipeline: Arc<RwLock<Option<Arc<InferencePipeline>>>>,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// State without a model; call `reload_model` to load one
    pub fn new(config: Config) -> Self {
        Self {
            config,
            sessions: SessionStore::default(),
            pipeline: Arc::new(RwLock::new(None)),
            started_at: Utc::now(),
        }
    }

    pub fn with_pipeline(config: Config, pipeline: InferencePipeline) -> Self {
        let state = Self::new(config);
        *state.pipeline.write() = Some(Arc::new(pipeline));
        state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn model_loaded(&self) -> bool {
        self.pipeline.read().is_some()
    }

    pub fn pipeline(&self) -> AppResult<Arc<InferencePipeline>> {
        self.pipeline.read().clone().ok_or_else(|| {
            AppError::Pipeline(PipelineError::ModelUnavailable(
                "no model loaded; POST /api/v1/model/reload after fixing the weights".to_string(),
            ))
        })
    }

    /// Load the model named by the config; the previous pipeline stays
    /// in service if loading fails
    pub async fn reload_model(&self) -> AppResult<EngineStatus> {
        let config = self.config.pipeline.clone();
        let pipeline = tokio::task::spawn_blocking(move || InferencePipeline::from_config(&config)).await??;
        let status = pipeline.status();

        *self.pipeline.write() = Some(Arc::new(pipeline));
        tracing::info!("Model '{}' loaded on {}", status.model_name, status.inference_device);
        Ok(status)
    }
}
