//! Heatmap helpers shared by explanation strategies
//!
//! Scalar grid in [0, 1] -> Triangle-filter resize -> jet colormap -> alpha blend.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};

use crate::logic::error::{PipelineError, PipelineResult};

/// Default overlay opacity
pub const OVERLAY_ALPHA: f32 = 0.4;

type Grid = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    grid: Grid,
}

impl Heatmap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> PipelineResult<Self> {
        let len = values.len();
        let grid = ImageBuffer::from_raw(width, height, values)
            .filter(|_| width > 0 && height > 0)
            .ok_or_else(|| {
                PipelineError::InternalInferenceError(format!("heatmap {}x{} cannot hold {} values", width, height, len))
            })?;
        Ok(Self { grid })
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.grid.get_pixel(x, y)[0]
    }

    /// Rescale to [0, 1]; a flat map becomes all zeros
    pub fn normalized(mut self) -> Self {
        let min = self.grid.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = self.grid.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;

        for v in self.grid.iter_mut() {
            *v = if range > 1e-12 && v.is_finite() { (*v - min) / range } else { 0.0 };
        }
        self
    }

    /// Bilinear resize to `width` x `height`
    pub fn upsample(&self, width: u32, height: u32) -> Heatmap {
        Heatmap {
            grid: imageops::resize(&self.grid, width.max(1), height.max(1), FilterType::Triangle),
        }
    }
}

/// Jet colormap: 0 -> dark blue, 0.5 -> green, 1 -> dark red
pub fn jet(value: f32) -> Rgb<u8> {
    let v = value.clamp(0.0, 1.0);
    let channel = |offset: f32| -> u8 {
        let c = (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Alpha-blend a colored heatmap over `base`; sizes must match
pub fn blend(base: &RgbImage, heat: &Heatmap, alpha: f32) -> PipelineResult<RgbImage> {
    if heat.width() != base.width() || heat.height() != base.height() {
        return Err(PipelineError::InternalInferenceError(format!(
            "heatmap {}x{} does not match image {}x{}",
            heat.width(),
            heat.height(),
            base.width(),
            base.height()
        )));
    }

    let alpha = alpha.clamp(0.0, 1.0);
    Ok(RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let src = base.get_pixel(x, y);
        let color = jet(heat.get(x, y));
        let mix = |a: u8, b: u8| ((1.0 - alpha) * a as f32 + alpha * b as f32).round() as u8;
        Rgb([mix(src[0], color[0]), mix(src[1], color[1]), mix(src[2], color[2])])
    }))
}
