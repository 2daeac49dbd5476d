//! Session extractor
//!
//! Resolves the `:id` path segment against the session store so handlers
//! receive the session itself.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use neuroscan_core::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Session named by the request path
#[derive(Clone)]
pub struct SessionContext(pub Arc<Session>);

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid session id: {}", e)))?;

        state.sessions.get(id).map(SessionContext)
    }
}
