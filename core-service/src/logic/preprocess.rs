//! Image Preprocessing
//!
//! Canonical transform shared with training:
//! decode -> RGB8 -> bilinear resize to 224x224 (no crop) -> [0, 1] -> mean/std.
//!
//! `PreprocessSpec` is recorded in the model manifest; a model trained with a
//! different transform is refused at load time.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::constants::{CHANNEL_MEAN, CHANNEL_STD, INPUT_SIZE, MAX_IMAGE_BYTES};
use crate::logic::error::{PipelineError, PipelineResult};

const SPEC_TOLERANCE: f32 = 1e-6;

// ============================================================================
// PREPROCESSING PARAMETERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSpec {
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Only "bilinear" is produced by this crate
    pub resize: String,
    /// Full field of view is kept; center-crop models are incompatible
    pub center_crop: bool,
}

impl PreprocessSpec {
    pub fn canonical() -> Self {
        Self {
            input_size: INPUT_SIZE,
            mean: CHANNEL_MEAN,
            std: CHANNEL_STD,
            resize: "bilinear".to_string(),
            center_crop: false,
        }
    }

    /// Describe the first difference against `other`, if any
    pub fn mismatch(&self, other: &PreprocessSpec) -> Option<String> {
        if self.input_size != other.input_size {
            return Some(format!("input_size {} != {}", self.input_size, other.input_size));
        }
        if !self.resize.eq_ignore_ascii_case(&other.resize) {
            return Some(format!("resize {} != {}", self.resize, other.resize));
        }
        if self.center_crop != other.center_crop {
            return Some(format!("center_crop {} != {}", self.center_crop, other.center_crop));
        }
        for c in 0..3 {
            if (self.mean[c] - other.mean[c]).abs() > SPEC_TOLERANCE {
                return Some(format!("mean[{}] {} != {}", c, self.mean[c], other.mean[c]));
            }
            if (self.std[c] - other.std[c]).abs() > SPEC_TOLERANCE {
                return Some(format!("std[{}] {} != {}", c, self.std[c], other.std[c]));
            }
        }
        None
    }
}

// ============================================================================
// PREPROCESSOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    spec: PreprocessSpec,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self {
            spec: PreprocessSpec::canonical(),
        }
    }

    pub fn spec(&self) -> &PreprocessSpec {
        &self.spec
    }

    /// Decode any supported raster format into RGB8
    pub fn decode(&self, bytes: &[u8]) -> PipelineResult<RgbImage> {
        if bytes.is_empty() {
            return Err(PipelineError::InputError("empty image upload".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(PipelineError::InputError(format!(
                "image is {} bytes, limit is {}",
                bytes.len(),
                MAX_IMAGE_BYTES
            )));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::InputError(format!("cannot decode image: {}", e)))?;
        let rgb = decoded.to_rgb8();

        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(PipelineError::InputError("image has a zero dimension".to_string()));
        }

        log::debug!("Decoded image {}x{}", rgb.width(), rgb.height());
        Ok(rgb)
    }

    /// Produce the 1x3xNxN normalized tensor
    pub fn preprocess(&self, image: &RgbImage) -> PipelineResult<Array4<f32>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::InputError("image has a zero dimension".to_string()));
        }

        let size = self.spec.input_size;
        let resized = imageops::resize(image, size, size, FilterType::Triangle);

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let scaled = pixel[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (scaled - self.spec.mean[c]) / self.spec.std[c];
            }
        }

        Ok(tensor)
    }
}
