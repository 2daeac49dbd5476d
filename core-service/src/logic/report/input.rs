//! Externally supplied report records
//!
//! Every field is optional at the serde layer so a missing field is reported
//! by name instead of failing deserialization as a whole.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TIMESTAMP_FORMAT;
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::model::{ConfidenceCategory, ConfidenceThresholds, DiseaseLabel, ProbabilityDistribution, LABEL_COUNT};
use crate::logic::record::InferenceRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub timestamp: Option<String>,
    pub image_name: Option<String>,
    pub prediction: Option<String>,
    pub confidence: Option<f64>,
    pub confidence_level: Option<String>,
    pub probabilities: Option<BTreeMap<String, f64>>,
}

fn required<T>(value: Option<T>, field: &str) -> PipelineResult<T> {
    value.ok_or_else(|| PipelineError::validation(field, "required field is missing"))
}

impl ReportRecord {
    /// Convert into a checked `InferenceRecord`; nothing is defaulted
    pub fn into_record(self, thresholds: &ConfidenceThresholds) -> PipelineResult<InferenceRecord> {
        let raw_ts = required(self.timestamp, "timestamp")?;
        let timestamp = NaiveDateTime::parse_from_str(raw_ts.trim(), TIMESTAMP_FORMAT).map_err(|e| {
            PipelineError::validation("timestamp", format!("'{}' is not YYYY-MM-DD HH:MM:SS: {}", raw_ts, e))
        })?;

        let image_name = required(self.image_name, "image_name")?;

        let raw_label = required(self.prediction, "prediction")?;
        let label = DiseaseLabel::parse(&raw_label)
            .ok_or_else(|| PipelineError::validation("prediction", format!("unknown label '{}'", raw_label)))?;

        let confidence = required(self.confidence, "confidence")?;

        let raw_level = required(self.confidence_level, "confidence_level")?;
        let category = ConfidenceCategory::parse(&raw_level)
            .ok_or_else(|| PipelineError::validation("confidence_level", format!("unknown level '{}'", raw_level)))?;

        let probabilities = required(self.probabilities, "probabilities")?;
        let distribution = distribution_from_map(&probabilities)?;

        InferenceRecord::from_parts(
            Uuid::new_v4(),
            timestamp,
            image_name,
            label,
            confidence,
            category,
            distribution,
            thresholds,
        )
    }
}

fn distribution_from_map(map: &BTreeMap<String, f64>) -> PipelineResult<ProbabilityDistribution> {
    let mut values = [None; LABEL_COUNT];
    for (name, value) in map {
        let label = DiseaseLabel::parse(name)
            .ok_or_else(|| PipelineError::validation("probabilities", format!("unknown label '{}'", name)))?;
        if values[label.index()].replace(*value).is_some() {
            return Err(PipelineError::validation("probabilities", format!("duplicate entry for {}", label)));
        }
    }

    let mut complete = [0.0; LABEL_COUNT];
    for (i, slot) in values.iter().enumerate() {
        complete[i] = slot.ok_or_else(|| {
            PipelineError::validation("probabilities", format!("missing entry for {}", DiseaseLabel::ALL[i]))
        })?;
    }
    ProbabilityDistribution::new(complete)
}

impl From<&InferenceRecord> for ReportRecord {
    fn from(record: &InferenceRecord) -> Self {
        Self {
            timestamp: Some(record.formatted_timestamp()),
            image_name: Some(record.image_identifier().to_string()),
            prediction: Some(record.predicted_label().to_string()),
            confidence: Some(record.confidence()),
            confidence_level: Some(record.confidence_category().to_string()),
            probabilities: Some(
                record
                    .probability_distribution()
                    .iter()
                    .map(|(label, p)| (label.to_string(), p))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ReportRecord {
        ReportRecord {
            timestamp: Some("2026-01-05 14:03:22".to_string()),
            image_name: Some("mri_axial_07.jpg".to_string()),
            prediction: Some("Normal".to_string()),
            confidence: Some(0.88),
            confidence_level: Some("High".to_string()),
            probabilities: Some(BTreeMap::from([
                ("Moyamoya/IVH".to_string(), 0.05),
                ("NF1".to_string(), 0.03),
                ("Optic Glioma".to_string(), 0.02),
                ("Tuberous Sclerosis".to_string(), 0.02),
                ("Normal".to_string(), 0.88),
            ])),
        }
    }

    fn missing_field(record: ReportRecord) -> String {
        match record.into_record(&ConfidenceThresholds::default()) {
            Err(PipelineError::ValidationError { field, .. }) => field,
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_record_converts() {
        let record = complete().into_record(&ConfidenceThresholds::default()).unwrap();
        assert_eq!(record.predicted_label(), DiseaseLabel::Normal);
        assert_eq!(record.formatted_timestamp(), "2026-01-05 14:03:22");
    }

    #[test]
    fn test_each_missing_field_is_named() {
        assert_eq!(missing_field(ReportRecord { timestamp: None, ..complete() }), "timestamp");
        assert_eq!(missing_field(ReportRecord { image_name: None, ..complete() }), "image_name");
        assert_eq!(missing_field(ReportRecord { prediction: None, ..complete() }), "prediction");
        assert_eq!(missing_field(ReportRecord { confidence: None, ..complete() }), "confidence");
        assert_eq!(missing_field(ReportRecord { confidence_level: None, ..complete() }), "confidence_level");
        assert_eq!(missing_field(ReportRecord { probabilities: None, ..complete() }), "probabilities");
    }

    #[test]
    fn test_partial_distribution_rejected() {
        let mut record = complete();
        record.probabilities.as_mut().unwrap().remove("NF1");
        assert_eq!(missing_field(record), "probabilities");
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let record = ReportRecord { timestamp: Some("yesterday".to_string()), ..complete() };
        assert_eq!(missing_field(record), "timestamp");
    }

    #[test]
    fn test_from_json_with_missing_field() {
        let json = r#"{"timestamp":"2026-01-05 14:03:22","prediction":"Normal","confidence":0.88,
                       "confidence_level":"High","probabilities":{"Normal":0.88}}"#;
        let record: ReportRecord = serde_json::from_str(json).unwrap();
        assert_eq!(missing_field(record), "image_name");
    }
}
