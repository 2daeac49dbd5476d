//! Model Types
//!
//! Label set and probability distribution produced by the classifier.
//! No inference logic here, only data structures and their invariants.

use serde::{Deserialize, Serialize};

use crate::constants::PROBABILITY_TOLERANCE;
use crate::logic::error::{PipelineError, PipelineResult};

// ============================================================================
// DISEASE LABEL
// ============================================================================

/// Number of classes the classifier was trained on
pub const LABEL_COUNT: usize = 5;

/// Closed label set, in classifier output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseLabel {
    MoyamoyaIVH,
    NF1,
    OpticGlioma,
    TuberousSclerosis,
    Normal,
}

impl DiseaseLabel {
    pub const ALL: [DiseaseLabel; LABEL_COUNT] = [
        DiseaseLabel::MoyamoyaIVH,
        DiseaseLabel::NF1,
        DiseaseLabel::OpticGlioma,
        DiseaseLabel::TuberousSclerosis,
        DiseaseLabel::Normal,
    ];

    pub fn index(&self) -> usize {
        match self {
            DiseaseLabel::MoyamoyaIVH => 0,
            DiseaseLabel::NF1 => 1,
            DiseaseLabel::OpticGlioma => 2,
            DiseaseLabel::TuberousSclerosis => 3,
            DiseaseLabel::Normal => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short name shown in tables and history
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseLabel::MoyamoyaIVH => "Moyamoya/IVH",
            DiseaseLabel::NF1 => "NF1",
            DiseaseLabel::OpticGlioma => "Optic Glioma",
            DiseaseLabel::TuberousSclerosis => "Tuberous Sclerosis",
            DiseaseLabel::Normal => "Normal",
        }
    }

    /// Long clinical name printed on reports
    pub fn clinical_name(&self) -> &'static str {
        match self {
            DiseaseLabel::MoyamoyaIVH => "Moyamoya Disease with Intraventricular Hemorrhage (IVH)",
            DiseaseLabel::NF1 => "Neurofibromatosis Type 1 (NF1)",
            DiseaseLabel::OpticGlioma => "Optic Glioma",
            DiseaseLabel::TuberousSclerosis => "Tuberous Sclerosis",
            DiseaseLabel::Normal => "Normal Brain",
        }
    }

    /// Accepts the enum identifier or the display name, case-insensitive
    pub fn parse(value: &str) -> Option<Self> {
        let needle = value.trim();
        Self::ALL.iter().copied().find(|label| {
            label.as_str().eq_ignore_ascii_case(needle)
                || format!("{:?}", label).eq_ignore_ascii_case(needle)
        })
    }
}

impl std::fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PROBABILITY DISTRIBUTION
// ============================================================================

/// One probability per label, summing to 1.0. Deserialization goes
/// through the same checks as `new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; LABEL_COUNT]", into = "[f64; LABEL_COUNT]")]
pub struct ProbabilityDistribution {
    values: [f64; LABEL_COUNT],
}

impl TryFrom<[f64; LABEL_COUNT]> for ProbabilityDistribution {
    type Error = PipelineError;

    fn try_from(values: [f64; LABEL_COUNT]) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<ProbabilityDistribution> for [f64; LABEL_COUNT] {
    fn from(distribution: ProbabilityDistribution) -> Self {
        distribution.values
    }
}

impl ProbabilityDistribution {
    /// Build from raw values, checking range and normalization
    pub fn new(values: [f64; LABEL_COUNT]) -> PipelineResult<Self> {
        for (label, value) in DiseaseLabel::ALL.iter().zip(values.iter()) {
            if !value.is_finite() || *value < 0.0 || *value > 1.0 {
                return Err(PipelineError::validation(
                    "probabilities",
                    format!("{} has out-of-range probability {}", label, value),
                ));
            }
        }

        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(PipelineError::validation(
                "probabilities",
                format!("probabilities sum to {:.9}, expected 1.0", sum),
            ));
        }

        Ok(Self { values })
    }

    /// Numerically stable softmax over raw logits
    pub fn from_logits(logits: &[f32]) -> PipelineResult<Self> {
        if logits.len() != LABEL_COUNT {
            return Err(PipelineError::InternalInferenceError(format!(
                "expected {} logits, got {}",
                LABEL_COUNT,
                logits.len()
            )));
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InternalInferenceError(
                "classifier produced non-finite logits".to_string(),
            ));
        }

        let max = logits.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64));
        let mut values = [0.0f64; LABEL_COUNT];
        for (slot, &logit) in values.iter_mut().zip(logits.iter()) {
            *slot = (logit as f64 - max).exp();
        }
        let sum: f64 = values.iter().sum();
        for slot in values.iter_mut() {
            *slot /= sum;
        }

        Self::new(values).map_err(|e| PipelineError::InternalInferenceError(e.to_string()))
    }

    pub fn get(&self, label: DiseaseLabel) -> f64 {
        self.values[label.index()]
    }

    pub fn values(&self) -> &[f64; LABEL_COUNT] {
        &self.values
    }

    /// Highest-probability label; ties resolve to the lowest index
    pub fn argmax(&self) -> DiseaseLabel {
        let mut best = 0;
        for i in 1..LABEL_COUNT {
            if self.values[i] > self.values[best] {
                best = i;
            }
        }
        DiseaseLabel::ALL[best]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DiseaseLabel, f64)> + '_ {
        DiseaseLabel::ALL.iter().map(move |label| (*label, self.values[label.index()]))
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Classifier output for one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: DiseaseLabel,
    pub confidence: f64,
    pub distribution: ProbabilityDistribution,
}

impl Prediction {
    pub fn from_distribution(distribution: ProbabilityDistribution) -> Self {
        let label = distribution.argmax();
        Self {
            label,
            confidence: distribution.get(label),
            distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_rejects_invalid_distribution() {
        let ok: ProbabilityDistribution = serde_json::from_str("[0.1, 0.1, 0.1, 0.1, 0.6]").unwrap();
        assert_eq!(ok.argmax(), DiseaseLabel::Normal);
        assert_eq!(serde_json::to_string(&ok).unwrap(), "[0.1,0.1,0.1,0.1,0.6]");

        assert!(serde_json::from_str::<ProbabilityDistribution>("[0.5, 0.5, 0.5, 0.0, 0.0]").is_err());
        assert!(serde_json::from_str::<ProbabilityDistribution>("[1.5, -0.5, 0.0, 0.0, 0.0]").is_err());
    }

    #[test]
    fn test_label_order_is_stable() {
        for (i, label) in DiseaseLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(DiseaseLabel::from_index(i), Some(*label));
        }
        assert_eq!(DiseaseLabel::from_index(LABEL_COUNT), None);
    }

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!(DiseaseLabel::parse("Normal"), Some(DiseaseLabel::Normal));
        assert_eq!(DiseaseLabel::parse("optic glioma"), Some(DiseaseLabel::OpticGlioma));
        assert_eq!(DiseaseLabel::parse("TuberousSclerosis"), Some(DiseaseLabel::TuberousSclerosis));
        assert_eq!(DiseaseLabel::parse("Moyamoya/IVH"), Some(DiseaseLabel::MoyamoyaIVH));
        assert_eq!(DiseaseLabel::parse("glioblastoma"), None);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let dist = ProbabilityDistribution::from_logits(&[2.0, -1.0, 0.5, 0.0, 3.5]).unwrap();
        let sum: f64 = dist.values().iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(dist.argmax(), DiseaseLabel::Normal);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let dist = ProbabilityDistribution::from_logits(&[1000.0, 999.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(dist.argmax(), DiseaseLabel::MoyamoyaIVH);
        assert!(dist.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_rejects_wrong_logit_count() {
        let err = ProbabilityDistribution::from_logits(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InternalInferenceError(_)));
    }

    #[test]
    fn test_rejects_nan_logits() {
        let err = ProbabilityDistribution::from_logits(&[f32::NAN, 0.0, 0.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InternalInferenceError(_)));
    }

    #[test]
    fn test_rejects_unnormalized_values() {
        let err = ProbabilityDistribution::new([0.5, 0.5, 0.5, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationError { .. }));
    }

    #[test]
    fn test_prediction_takes_argmax() {
        let dist = ProbabilityDistribution::new([0.05, 0.03, 0.02, 0.02, 0.88]).unwrap();
        let prediction = Prediction::from_distribution(dist);
        assert_eq!(prediction.label, DiseaseLabel::Normal);
        assert_eq!(prediction.confidence, 0.88);
    }
}
