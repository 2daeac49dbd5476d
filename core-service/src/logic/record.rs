//! Inference Record
//!
//! Immutable result of one successful classification. Built only after both
//! classification and categorization succeed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{PROBABILITY_TOLERANCE, TIMESTAMP_FORMAT};
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::model::{ConfidenceCategory, ConfidenceThresholds, DiseaseLabel, Prediction, ProbabilityDistribution};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRecord {
    id: Uuid,
    timestamp: NaiveDateTime,
    image_identifier: String,
    predicted_label: DiseaseLabel,
    confidence: f64,
    confidence_category: ConfidenceCategory,
    probability_distribution: ProbabilityDistribution,
}

impl InferenceRecord {
    /// Combine a prediction with its category
    pub fn new(
        image_identifier: impl Into<String>,
        prediction: &Prediction,
        thresholds: &ConfidenceThresholds,
        timestamp: NaiveDateTime,
    ) -> PipelineResult<Self> {
        Self::from_parts(
            Uuid::new_v4(),
            timestamp,
            image_identifier.into(),
            prediction.label,
            prediction.confidence,
            thresholds.categorize(prediction.confidence),
            prediction.distribution,
            thresholds,
        )
    }

    /// Field-checked constructor shared with externally supplied records
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: Uuid,
        timestamp: NaiveDateTime,
        image_identifier: String,
        predicted_label: DiseaseLabel,
        confidence: f64,
        confidence_category: ConfidenceCategory,
        probability_distribution: ProbabilityDistribution,
        thresholds: &ConfidenceThresholds,
    ) -> PipelineResult<Self> {
        let record = Self {
            id,
            timestamp,
            image_identifier,
            predicted_label,
            confidence,
            confidence_category,
            probability_distribution,
        };
        record.validate(thresholds)?;
        Ok(record)
    }

    /// Cross-field consistency checks
    pub fn validate(&self, thresholds: &ConfidenceThresholds) -> PipelineResult<()> {
        if self.image_identifier.trim().is_empty() {
            return Err(PipelineError::validation("image_name", "missing image reference"));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(PipelineError::validation(
                "confidence",
                format!("{} is outside [0, 1]", self.confidence),
            ));
        }

        let sum: f64 = self.probability_distribution.values().iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(PipelineError::validation("probabilities", format!("sum is {:.9}", sum)));
        }

        let argmax = self.probability_distribution.argmax();
        let top = self.probability_distribution.get(argmax);
        if (self.probability_distribution.get(self.predicted_label) - top).abs() > PROBABILITY_TOLERANCE {
            return Err(PipelineError::validation(
                "prediction",
                format!("{} is not the most probable label ({})", self.predicted_label, argmax),
            ));
        }
        if (self.probability_distribution.get(self.predicted_label) - self.confidence).abs() > PROBABILITY_TOLERANCE {
            return Err(PipelineError::validation(
                "confidence",
                format!("{} does not match P({})", self.confidence, self.predicted_label),
            ));
        }

        let expected = thresholds.categorize(self.confidence);
        if expected != self.confidence_category {
            return Err(PipelineError::validation(
                "confidence_level",
                format!("{} but confidence {} maps to {}", self.confidence_category, self.confidence, expected),
            ));
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn image_identifier(&self) -> &str {
        &self.image_identifier
    }

    pub fn predicted_label(&self) -> DiseaseLabel {
        self.predicted_label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn confidence_category(&self) -> ConfidenceCategory {
        self.confidence_category
    }

    pub fn message(&self) -> &'static str {
        self.confidence_category.message()
    }

    pub fn probability_distribution(&self) -> &ProbabilityDistribution {
        &self.probability_distribution
    }
}

/// History row as shown to users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// "YYYY-MM-DD HH:MM:SS"
    pub timestamp: String,
    pub image_name: String,
    pub prediction: String,
    pub confidence: f64,
    pub confidence_level: String,
}

impl From<&InferenceRecord> for HistoryEntry {
    fn from(record: &InferenceRecord) -> Self {
        Self {
            timestamp: record.formatted_timestamp(),
            image_name: record.image_identifier().to_string(),
            prediction: record.predicted_label().to_string(),
            confidence: record.confidence(),
            confidence_level: record.confidence_category().to_string(),
        }
    }
}
