//! Placeholder overlay
//!
//! NOT a clinically valid explanation. Produces a deterministic synthetic
//! heat pattern that looks like a saliency map so demos and tests can run
//! without a Grad-CAM capable model. It carries no information about what
//! the classifier actually looked at.

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::heatmap::{blend, Heatmap, OVERLAY_ALPHA};
use super::ExplanationStrategy;
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::model::DiseaseLabel;

/// Coarse grid the blobs are drawn on before upsampling
const GRID: usize = 28;
const BLOB_COUNT: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct PlaceholderOverlay;

impl PlaceholderOverlay {
    pub fn new() -> Self {
        Self
    }

    /// Same label and size always give the same pattern
    fn pattern(&self, width: u32, height: u32, label: DiseaseLabel) -> PipelineResult<Heatmap> {
        let seed = ((label.index() as u64) << 48) ^ ((width as u64) << 24) ^ (height as u64);
        let mut rng = StdRng::seed_from_u64(seed);

        let blobs: Vec<(f32, f32, f32, f32)> = (0..BLOB_COUNT)
            .map(|_| {
                let cx = rng.gen_range(0.3..0.7) * GRID as f32;
                let cy = rng.gen_range(0.3..0.7) * GRID as f32;
                let sigma = rng.gen_range(0.08..0.18) * GRID as f32;
                let weight = rng.gen_range(0.5..1.0);
                (cx, cy, sigma, weight)
            })
            .collect();

        let mut values = Vec::with_capacity(GRID * GRID);
        for y in 0..GRID {
            for x in 0..GRID {
                let v: f32 = blobs
                    .iter()
                    .map(|&(cx, cy, sigma, weight)| {
                        let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                        weight * (-d2 / (2.0 * sigma * sigma)).exp()
                    })
                    .sum();
                values.push(v);
            }
        }

        Ok(Heatmap::new(GRID as u32, GRID as u32, values)?.normalized())
    }
}

impl ExplanationStrategy for PlaceholderOverlay {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn clinically_valid(&self) -> bool {
        false
    }

    fn explain(&self, image: &RgbImage, label: DiseaseLabel) -> PipelineResult<RgbImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::InputError("image has a zero dimension".to_string()));
        }
        let heat = self.pattern(image.width(), image.height(), label)?;
        blend(image, &heat.upsample(image.width(), image.height()), OVERLAY_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_same_dimensions_as_input() {
        let image = RgbImage::from_pixel(317, 141, Rgb([40, 40, 40]));
        let overlay = PlaceholderOverlay::new().explain(&image, DiseaseLabel::NF1).unwrap();
        assert_eq!(overlay.dimensions(), image.dimensions());
    }

    #[test]
    fn test_deterministic() {
        let image = RgbImage::from_pixel(64, 64, Rgb([90, 90, 90]));
        let strategy = PlaceholderOverlay::new();
        let a = strategy.explain(&image, DiseaseLabel::Normal).unwrap();
        let b = strategy.explain(&image, DiseaseLabel::Normal).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pattern_depends_on_label() {
        let image = RgbImage::from_pixel(64, 64, Rgb([90, 90, 90]));
        let strategy = PlaceholderOverlay::new();
        let a = strategy.explain(&image, DiseaseLabel::Normal).unwrap();
        let b = strategy.explain(&image, DiseaseLabel::OpticGlioma).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_dimension_image_rejected() {
        let err = PlaceholderOverlay::new().explain(&RgbImage::new(0, 12), DiseaseLabel::Normal).unwrap_err();
        assert!(matches!(err, PipelineError::InputError(_)));
    }

    #[test]
    fn test_flagged_as_not_clinically_valid() {
        assert!(!PlaceholderOverlay::new().clinically_valid());
    }
}
