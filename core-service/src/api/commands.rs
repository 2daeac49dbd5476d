//! Commands - API for outer surfaces (HTTP server, CLI)
//!
//! Thin, serde-friendly wrappers over the pipeline. Every surface goes
//! through these so responses look the same everywhere.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::error::PipelineResult;
use crate::logic::explain::{encode_png, Explanation};
use crate::logic::history::Session;
use crate::logic::model::{ConfidenceCategory, ConfidenceThresholds, DiseaseLabel, EngineStatus};
use crate::logic::pipeline::{InferencePipeline, Upload};
use crate::logic::record::{HistoryEntry, InferenceRecord};
use crate::logic::report::{ReportDocument, ReportGenerator, ReportRecord};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Result of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub record_id: Uuid,
    pub timestamp: String,
    pub image_name: String,
    pub label: String,
    pub clinical_name: String,
    pub confidence: f64,
    /// Every label, in classifier output order
    pub probabilities: Vec<ClassProbability>,
    pub confidence_level: ConfidenceCategory,
    pub message: String,
}

impl From<&InferenceRecord> for PredictionResponse {
    fn from(record: &InferenceRecord) -> Self {
        Self {
            record_id: record.id(),
            timestamp: record.formatted_timestamp(),
            image_name: record.image_identifier().to_string(),
            label: record.predicted_label().to_string(),
            clinical_name: record.predicted_label().clinical_name().to_string(),
            confidence: record.confidence(),
            probabilities: record
                .probability_distribution()
                .iter()
                .map(|(label, probability)| ClassProbability {
                    label: label.to_string(),
                    probability,
                })
                .collect(),
            confidence_level: record.confidence_category(),
            message: record.message().to_string(),
        }
    }
}

/// PNG overlay plus where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayResponse {
    #[serde(skip)]
    pub png: Vec<u8>,
    pub strategy: &'static str,
    pub clinically_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResponse {
    pub confidence: f64,
    pub category: ConfidenceCategory,
    pub message: String,
}

// ============================================================================
// COMMANDS
// ============================================================================

pub async fn run_prediction(
    pipeline: &InferencePipeline,
    session: &Session,
    image_name: &str,
    bytes: Vec<u8>,
) -> PipelineResult<PredictionResponse> {
    let record = pipeline.predict(session, Upload::new(image_name, bytes)).await?;
    Ok(PredictionResponse::from(record.as_ref()))
}

/// Prediction plus report; history grows only if the report was rendered
pub async fn predict_with_report(
    pipeline: &InferencePipeline,
    session: &Session,
    image_name: &str,
    bytes: Vec<u8>,
) -> PipelineResult<(PredictionResponse, ReportDocument)> {
    let (record, report) = pipeline
        .predict_and_report(session, Upload::new(image_name, bytes))
        .await?;
    Ok((PredictionResponse::from(record.as_ref()), report))
}

pub fn categorize_confidence(thresholds: &ConfidenceThresholds, confidence: f64) -> ConfidenceResponse {
    let assessment = crate::logic::model::categorize_confidence(thresholds, confidence);
    ConfidenceResponse {
        confidence,
        category: assessment.category,
        message: assessment.message,
    }
}

/// PNG-encoded overlay tagged with its strategy
pub async fn explain(
    pipeline: &InferencePipeline,
    bytes: Vec<u8>,
    label: DiseaseLabel,
) -> PipelineResult<OverlayResponse> {
    let overlay = pipeline.explain(bytes, label).await?;
    Ok(OverlayResponse {
        png: encode_png(&overlay.image)?,
        strategy: overlay.strategy,
        clinically_valid: overlay.clinically_valid,
    })
}

/// Render an externally supplied record
pub fn generate_report(
    record: ReportRecord,
    overlay: &Explanation,
    thresholds: &ConfidenceThresholds,
) -> PipelineResult<ReportDocument> {
    ReportGenerator::new(*thresholds).generate_from(record, overlay)
}

pub fn get_prediction_history(session: &Session) -> Vec<HistoryEntry> {
    session.ledger().entries()
}

pub fn get_engine_status(pipeline: &InferencePipeline) -> EngineStatus {
    pipeline.status()
}
