//! Central Configuration Constants
//!
//! Single source of truth for pipeline defaults.
//! Anything that must stay in lockstep with training lives here.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "NeuroScan";

// ============================================
// Canonical preprocessing (must match training)
// ============================================

/// Square input edge expected by the classifier
pub const INPUT_SIZE: u32 = 224;

/// Per-channel mean applied after scaling to [0, 1]
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel std applied after mean subtraction
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maximum accepted upload size
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

// ============================================
// Confidence thresholds
// ============================================

/// At or above this confidence = High
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.85;

/// At or above this confidence (and below High) = Moderate
pub const DEFAULT_MODERATE_THRESHOLD: f64 = 0.60;

/// Tolerance for probability sums
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

// ============================================
// Model loading
// ============================================

/// Default model manifest location
pub const DEFAULT_MANIFEST_PATH: &str = "models/manifest.json";

/// Default number of ONNX sessions kept in the pool
pub const DEFAULT_SESSION_POOL: usize = 2;

// ============================================
// Report
// ============================================

/// MIME type of generated reports
pub const REPORT_MIME: &str = "application/pdf";

/// Suggested download filename
pub const REPORT_FILENAME: &str = "AI_Prediction_Report.pdf";

/// Fixed disclaimer printed on every report
pub const CLINICAL_DISCLAIMER: &str = "Disclaimer: This AI system is a clinical decision-support tool. \
Its output is decision support only. Final diagnosis must always be confirmed by a qualified medical professional.";

/// Caption under overlays that do not come from the model's evidence
pub const PLACEHOLDER_CAPTION: &str =
    "Placeholder pattern, not a clinical explanation. It does not show what the model attended to.";

/// Timestamp layout used in history and reports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
