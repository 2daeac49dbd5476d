//! Explanation Module - Visual saliency overlays
//!
//! Strategies are selected by configuration:
//! - `placeholder`: deterministic synthetic pattern for demos and tests.
//!   Not a clinically valid explanation.
//! - `gradcam`: Grad-CAM from the model's exported activations and gradients.

pub mod gradcam;
pub mod heatmap;
pub mod placeholder;

use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;

use image::{DynamicImage, ImageOutputFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::model::{ClassifierService, DiseaseLabel};
use crate::logic::preprocess::ImagePreprocessor;

pub use gradcam::GradCamOverlay;
pub use placeholder::PlaceholderOverlay;

/// Produces an overlay with the same pixel dimensions as the input
pub trait ExplanationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// False for anything that does not reflect the model's evidence
    fn clinically_valid(&self) -> bool;

    fn explain(&self, image: &RgbImage, label: DiseaseLabel) -> PipelineResult<RgbImage>;

    /// `explain` plus the provenance the report and API surface
    fn render(&self, image: &RgbImage, label: DiseaseLabel) -> PipelineResult<Explanation> {
        Ok(Explanation::new(self.explain(image, label)?, self.name(), self.clinically_valid()))
    }
}

/// An overlay tagged with the strategy that drew it
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub image: RgbImage,
    pub strategy: &'static str,
    pub clinically_valid: bool,
}

impl Explanation {
    pub fn new(image: RgbImage, strategy: &'static str, clinically_valid: bool) -> Self {
        Self {
            image,
            strategy,
            clinically_valid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationKind {
    Placeholder,
    GradCam,
}

impl FromStr for ExplanationKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "placeholder" | "mock" => Ok(ExplanationKind::Placeholder),
            "gradcam" | "grad-cam" => Ok(ExplanationKind::GradCam),
            other => Err(PipelineError::validation(
                "explanation_strategy",
                format!("unknown strategy '{}'", other),
            )),
        }
    }
}

pub fn build_strategy(
    kind: ExplanationKind,
    classifier: Arc<ClassifierService>,
    preprocessor: ImagePreprocessor,
) -> PipelineResult<Arc<dyn ExplanationStrategy>> {
    match kind {
        ExplanationKind::Placeholder => {
            log::warn!("Explanation overlay uses the placeholder pattern - not a clinically valid explanation");
            Ok(Arc::new(PlaceholderOverlay::new()))
        }
        ExplanationKind::GradCam => Ok(Arc::new(GradCamOverlay::new(classifier, preprocessor)?)),
    }
}

/// PNG bytes for download or embedding
pub fn encode_png(image: &RgbImage) -> PipelineResult<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .map_err(|e| PipelineError::InternalInferenceError(format!("PNG encode failed: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::{ClassifierBackend, InferenceError};
    use image::Rgb;
    use ndarray::Array4;

    struct Plain;

    impl ClassifierBackend for Plain {
        fn name(&self) -> &str {
            "plain"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.0; 5])
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("placeholder".parse::<ExplanationKind>().unwrap(), ExplanationKind::Placeholder);
        assert_eq!("Grad-CAM".parse::<ExplanationKind>().unwrap(), ExplanationKind::GradCam);
        assert!("lime".parse::<ExplanationKind>().is_err());
    }

    #[test]
    fn test_build_selects_by_config() {
        let classifier = Arc::new(ClassifierService::new(Arc::new(Plain)));
        let strategy = build_strategy(ExplanationKind::Placeholder, classifier.clone(), ImagePreprocessor::new()).unwrap();
        assert_eq!(strategy.name(), "placeholder");

        let explanation = strategy.render(&RgbImage::new(8, 8), DiseaseLabel::NF1).unwrap();
        assert_eq!(explanation.strategy, "placeholder");
        assert!(!explanation.clinically_valid);
        assert_eq!(explanation.image.dimensions(), (8, 8));

        let err = build_strategy(ExplanationKind::GradCam, classifier, ImagePreprocessor::new()).err().unwrap();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
    }

    #[test]
    fn test_png_roundtrip_keeps_size() {
        let image = RgbImage::from_pixel(9, 5, Rgb([1, 2, 3]));
        let png = encode_png(&image).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.to_rgb8().dimensions(), (9, 5));
    }
}
