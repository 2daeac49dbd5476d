//! Model Module - Classifier inference
//!
//! Weights are loaded once, verified against the manifest and shared
//! read-only. Thresholds turn the winning probability into a clinical level.

pub mod inference;
pub mod manifest;
pub mod threshold;
pub mod types;

// Re-export common types
pub use inference::{ActivationMaps, ClassifierBackend, ClassifierService, EngineStatus, ForwardOutput, InferenceError, OnnxBackend};
pub use manifest::{load_model, LoadedModel, ModelManifest, OutputNames};
pub use threshold::{categorize_confidence, ConfidenceAssessment, ConfidenceCategory, ConfidenceThresholds};
pub use types::{DiseaseLabel, Prediction, ProbabilityDistribution, LABEL_COUNT};
