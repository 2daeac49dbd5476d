//! NeuroScan core
//!
//! Single-image classification of pediatric neuro-imaging scans into five
//! classes, confidence categorization, explanation overlays, session
//! history and PDF reports.

pub mod api;
pub mod constants;
pub mod logic;

pub use logic::explain::ExplanationKind;
pub use logic::model::{ClassifierBackend, ClassifierService, ConfidenceCategory, ConfidenceThresholds, DiseaseLabel};
pub use logic::{
    HistoryEntry, InferencePipeline, InferenceRecord, PipelineConfig, PipelineError, PipelineResult, ReportDocument,
    ReportRecord, Session, Upload,
};
