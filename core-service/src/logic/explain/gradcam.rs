//! Grad-CAM overlay
//!
//! Class activation map from the last convolutional block:
//! w_k = mean(dScore_c / dA_k), cam = ReLU(sum_k w_k * A_k).
//! Activations and gradients come from the exported graph's extra outputs.

use std::sync::Arc;

use image::RgbImage;
use ndarray::Axis;

use super::heatmap::{blend, Heatmap, OVERLAY_ALPHA};
use super::ExplanationStrategy;
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::model::{ActivationMaps, ClassifierService, DiseaseLabel};
use crate::logic::preprocess::ImagePreprocessor;

pub struct GradCamOverlay {
    classifier: Arc<ClassifierService>,
    preprocessor: ImagePreprocessor,
    alpha: f32,
}

impl GradCamOverlay {
    /// Refuses classifiers that cannot export activation maps
    pub fn new(classifier: Arc<ClassifierService>, preprocessor: ImagePreprocessor) -> PipelineResult<Self> {
        if !classifier.supports_activation_maps() {
            return Err(PipelineError::ModelUnavailable(
                "Grad-CAM selected but the model does not export activations and gradients".to_string(),
            ));
        }
        Ok(Self {
            classifier,
            preprocessor,
            alpha: OVERLAY_ALPHA,
        })
    }
}

/// Coarse (h x w) class activation map for `label`, normalized to [0, 1]
pub fn grad_cam(maps: &ActivationMaps, label: DiseaseLabel) -> PipelineResult<Heatmap> {
    let (channels, h, w) = maps.activations.dim();
    let (classes, g_channels, g_h, g_w) = maps.gradients.dim();

    if (g_channels, g_h, g_w) != (channels, h, w) || label.index() >= classes {
        return Err(PipelineError::InternalInferenceError(format!(
            "gradient shape {:?} does not match activations {:?}",
            maps.gradients.dim(),
            maps.activations.dim()
        )));
    }

    let class_grads = maps.gradients.index_axis(Axis(0), label.index());
    let mut cam = vec![0.0f32; h * w];

    for k in 0..channels {
        let grad_k = class_grads.index_axis(Axis(0), k);
        let weight = grad_k.sum() / (h * w).max(1) as f32;
        if weight == 0.0 {
            continue;
        }
        let act_k = maps.activations.index_axis(Axis(0), k);
        for ((y, x), a) in act_k.indexed_iter() {
            cam[y * w + x] += weight * a;
        }
    }

    for v in cam.iter_mut() {
        *v = v.max(0.0);
    }

    Ok(Heatmap::new(w as u32, h as u32, cam)?.normalized())
}

impl ExplanationStrategy for GradCamOverlay {
    fn name(&self) -> &'static str {
        "gradcam"
    }

    fn clinically_valid(&self) -> bool {
        true
    }

    fn explain(&self, image: &RgbImage, label: DiseaseLabel) -> PipelineResult<RgbImage> {
        let tensor = self.preprocessor.preprocess(image)?;
        let maps = self.classifier.activation_maps(&tensor)?;
        let cam = grad_cam(&maps, label)?;

        log::debug!(
            "Grad-CAM for {} on {}x{} activation grid",
            label,
            cam.width(),
            cam.height()
        );

        // Resize was non-cropping, so the grid maps onto the full frame
        blend(image, &cam.upsample(image.width(), image.height()), self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::{ClassifierBackend, ForwardOutput, InferenceError, LABEL_COUNT};
    use image::Rgb;
    use ndarray::{Array3, Array4};

    /// Two channels on a 2x2 grid: channel 0 lights the top-left, channel 1 the bottom-right
    fn maps() -> ActivationMaps {
        let mut activations = Array3::<f32>::zeros((2, 2, 2));
        activations[[0, 0, 0]] = 1.0;
        activations[[1, 1, 1]] = 1.0;

        let mut gradients = Array4::<f32>::zeros((LABEL_COUNT, 2, 2, 2));
        // Normal attends to channel 0, NF1 to channel 1
        gradients.index_axis_mut(Axis(0), DiseaseLabel::Normal.index()).index_axis_mut(Axis(0), 0).fill(1.0);
        gradients.index_axis_mut(Axis(0), DiseaseLabel::NF1.index()).index_axis_mut(Axis(0), 1).fill(1.0);
        ActivationMaps { activations, gradients }
    }

    #[test]
    fn test_cam_follows_class_gradients() {
        let normal = grad_cam(&maps(), DiseaseLabel::Normal).unwrap();
        assert_eq!(normal.get(0, 0), 1.0);
        assert_eq!(normal.get(1, 1), 0.0);

        let nf1 = grad_cam(&maps(), DiseaseLabel::NF1).unwrap();
        assert_eq!(nf1.get(1, 1), 1.0);
        assert_eq!(nf1.get(0, 0), 0.0);
    }

    #[test]
    fn test_negative_evidence_is_clipped() {
        let mut m = maps();
        m.gradients
            .index_axis_mut(Axis(0), DiseaseLabel::OpticGlioma.index())
            .index_axis_mut(Axis(0), 0)
            .fill(-1.0);
        let cam = grad_cam(&m, DiseaseLabel::OpticGlioma).unwrap();
        assert!((0..2).all(|y| (0..2).all(|x| cam.get(x, y) == 0.0)));
    }

    #[test]
    fn test_shape_mismatch_is_internal_error() {
        let m = ActivationMaps {
            activations: Array3::zeros((2, 2, 2)),
            gradients: Array4::zeros((LABEL_COUNT, 3, 2, 2)),
        };
        assert!(matches!(
            grad_cam(&m, DiseaseLabel::Normal),
            Err(PipelineError::InternalInferenceError(_))
        ));
    }

    struct MapsBackend;

    impl ClassifierBackend for MapsBackend {
        fn name(&self) -> &str {
            "maps"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.0, 0.0, 0.0, 0.0, 1.0])
        }

        fn supports_activation_maps(&self) -> bool {
            true
        }

        fn forward_with_maps(&self, input: &Array4<f32>) -> Result<ForwardOutput, InferenceError> {
            Ok(ForwardOutput {
                logits: self.forward(input)?,
                maps: Some(maps()),
            })
        }
    }

    struct PlainBackend;

    impl ClassifierBackend for PlainBackend {
        fn name(&self) -> &str {
            "plain"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.0; 5])
        }
    }

    #[test]
    fn test_overlay_matches_input_size() {
        let classifier = Arc::new(ClassifierService::new(Arc::new(MapsBackend)));
        let strategy = GradCamOverlay::new(classifier, ImagePreprocessor::new()).unwrap();
        let image = RgbImage::from_pixel(120, 80, Rgb([60, 60, 60]));

        let overlay = strategy.explain(&image, DiseaseLabel::Normal).unwrap();
        assert_eq!(overlay.dimensions(), (120, 80));
        // Hot top-left corner is tinted red, cold bottom-right is tinted blue
        assert!(overlay.get_pixel(2, 2)[0] > overlay.get_pixel(2, 2)[2]);
        assert!(overlay.get_pixel(117, 77)[2] > overlay.get_pixel(117, 77)[0]);
    }

    #[test]
    fn test_requires_activation_outputs() {
        let classifier = Arc::new(ClassifierService::new(Arc::new(PlainBackend)));
        let err = GradCamOverlay::new(classifier, ImagePreprocessor::new()).err().unwrap();
        assert!(err.is_fatal());
    }
}
