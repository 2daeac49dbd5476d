//! HTTP handlers

pub mod confidence;
pub mod explain;
pub mod health;
pub mod model;
pub mod predictions;
pub mod reports;
pub mod sessions;

use serde::Deserialize;
use validator::Validate;

/// `?image_name=` on upload routes
#[derive(Debug, Deserialize, Validate)]
pub struct ImageQuery {
    #[validate(length(min = 1, max = 255))]
    pub image_name: String,
}
