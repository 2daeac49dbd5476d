//! Logic Module - Inference, explanation and reporting
//!
//! ## Layout
//! - `preprocess` - decode and canonicalize images into the model tensor
//! - `model/` - labels, ONNX inference, confidence thresholds, manifest
//! - `explain/` - overlay strategies (placeholder, Grad-CAM)
//! - `record` / `history` - inference records and session ledgers
//! - `report/` - PDF rendering
//! - `pipeline` - async orchestration of one upload

pub mod config;
pub mod error;
pub mod explain;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod record;
pub mod report;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use history::{HistoryLedger, Session};
pub use pipeline::{InferencePipeline, Upload};
pub use record::{HistoryEntry, InferenceRecord};
pub use report::{ReportDocument, ReportGenerator, ReportRecord};
