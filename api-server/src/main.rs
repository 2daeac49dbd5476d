//! NeuroScan HTTP Server
//!
//! Serves predictions, explanation overlays, session history and PDF
//! report download on top of `neuroscan-core`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    NEUROSCAN SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────────┐  ┌─────────────────────┐ │
//! │  │  API      │  │  Session      │  │  Inference Pipeline │ │
//! │  │  Gateway  │─▶│  Store        │─▶│  (blocking pool)    │ │
//! │  │  (Axum)   │  │  (in memory)  │  │                     │ │
//! │  └───────────┘  └───────────────┘  └──────────┬──────────┘ │
//! │                                               ▼             │
//! │                                   ┌─────────────────────┐  │
//! │                                   │  ONNX Runtime       │  │
//! │                                   └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod middleware;
mod state;


use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};
pub use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize logging; JSON lines in production
    let json_logs = std::env::var("ENVIRONMENT").map(|e| e == "production").unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuroscan_server=debug,neuroscan_core=info,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let config = config::Config::from_env().context("invalid configuration")?;

    tracing::info!("NeuroScan server starting ({})...", config.environment);
    tracing::info!("Model manifest: {}", config.pipeline.manifest_path.display());

    // Build application state
    let state = AppState::new(config.clone());
    if let Err(e) = state.reload_model().await {
        if config.is_production() {
            return Err(anyhow::anyhow!("model failed to load: {}", e));
        }
        tracing::warn!("Starting without a model (degraded): {}", e);
    }

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health::check))
        // Model
        .route("/api/v1/model", get(handlers::model::status))
        .route("/api/v1/model/reload", post(handlers::model::reload))
        // Sessions
        .route("/api/v1/sessions", post(handlers::sessions::create))
        .route("/api/v1/sessions/:id", delete(handlers::sessions::delete))
        .route("/api/v1/sessions/:id/history", get(handlers::sessions::history))
        // Inference
        .route("/api/v1/sessions/:id/predictions", post(handlers::predictions::create))
        .route("/api/v1/sessions/:id/report", post(handlers::reports::create))
        .route("/api/v1/explain", post(handlers::explain::create))
        .route("/api/v1/confidence", get(handlers::confidence::categorize))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
