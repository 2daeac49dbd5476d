//! Confidence Thresholds
//!
//! Maps a scalar confidence to High / Moderate / Low and the clinical
//! guidance attached to each level.
//!
//! The default boundaries (0.85 / 0.60) are not clinically calibrated and
//! must be validated before any real deployment.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HIGH_THRESHOLD, DEFAULT_MODERATE_THRESHOLD};
use crate::logic::error::{PipelineError, PipelineResult};

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceCategory {
    Low,
    Moderate,
    High,
}

impl ConfidenceCategory {
    pub const ALL: [ConfidenceCategory; 3] = [
        ConfidenceCategory::High,
        ConfidenceCategory::Moderate,
        ConfidenceCategory::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceCategory::High => "High",
            ConfidenceCategory::Moderate => "Moderate",
            ConfidenceCategory::Low => "Low",
        }
    }

    /// Clinical guidance for this level
    pub fn message(&self) -> &'static str {
        CATEGORY_MESSAGES[self.table_index()]
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }

    fn table_index(&self) -> usize {
        match self {
            ConfidenceCategory::High => 0,
            ConfidenceCategory::Moderate => 1,
            ConfidenceCategory::Low => 2,
        }
    }
}

impl std::fmt::Display for ConfidenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Indexed by `ConfidenceCategory::table_index`
const CATEGORY_MESSAGES: [&str; 3] = [
    "High confidence prediction. Findings are consistent with the predicted class; \
     confirm with standard clinical review.",
    "Moderate confidence. Interpret with caution and recommend additional specialist review.",
    "Low confidence. The model is uncertain; further diagnostic workup is recommended.",
];

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Threshold configuration (configurable, pending clinical calibration)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// At or above = High
    pub high: f64,
    /// At or above (and below `high`) = Moderate
    pub moderate: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            moderate: DEFAULT_MODERATE_THRESHOLD,
        }
    }
}

impl ConfidenceThresholds {
    pub fn new(high: f64, moderate: f64) -> PipelineResult<Self> {
        let thresholds = Self { high, moderate };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Boundaries must split [0, 1] into three non-empty bands
    pub fn validate(&self) -> PipelineResult<()> {
        let ordered = self.moderate > 0.0 && self.moderate < self.high && self.high <= 1.0;
        if !self.high.is_finite() || !self.moderate.is_finite() || !ordered {
            return Err(PipelineError::validation(
                "confidence_thresholds",
                format!(
                    "require 0 < moderate < high <= 1, got moderate={} high={}",
                    self.moderate, self.high
                ),
            ));
        }
        Ok(())
    }

    /// Total over every f64; NaN lands in Low
    pub fn categorize(&self, confidence: f64) -> ConfidenceCategory {
        let c = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };

        if c >= self.high {
            ConfidenceCategory::High
        } else if c >= self.moderate {
            ConfidenceCategory::Moderate
        } else {
            ConfidenceCategory::Low
        }
    }
}

/// Category plus its message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub category: ConfidenceCategory,
    pub message: String,
}

pub fn categorize_confidence(thresholds: &ConfidenceThresholds, confidence: f64) -> ConfidenceAssessment {
    let category = thresholds.categorize(confidence);
    ConfidenceAssessment {
        category,
        message: category.message().to_string(),
    }
}
