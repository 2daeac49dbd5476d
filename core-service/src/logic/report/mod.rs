//! Report Generator
//!
//! Renders one validated `InferenceRecord` plus its explanation overlay into
//! a single-page PDF. Output depends only on the inputs.

pub mod input;
pub mod pdf;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;

use crate::constants::{APP_NAME, CLINICAL_DISCLAIMER, PLACEHOLDER_CAPTION, REPORT_FILENAME, REPORT_MIME};
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::explain::Explanation;
use crate::logic::model::{ConfidenceCategory, ConfidenceThresholds};
use crate::logic::record::InferenceRecord;

pub use input::ReportRecord;
use pdf::{Font, PageContent, PAGE_HEIGHT, PAGE_WIDTH};

const MARGIN: f32 = 50.0;
const THUMBNAIL_MAX: u32 = 240;
const BAR_WIDTH: f32 = 200.0;
const DISCLAIMER_WRAP: usize = 95;
const IMAGE_WRAP: usize = 72;

// ============================================================================
// DOCUMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: &'static str,
    pub mime: &'static str,
}

impl ReportDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReportGenerator {
    thresholds: ConfidenceThresholds,
}

impl ReportGenerator {
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds }
    }

    /// Validate, lay out and serialize
    pub fn generate(&self, record: &InferenceRecord, overlay: &Explanation) -> PipelineResult<ReportDocument> {
        record.validate(&self.thresholds)?;
        if !pdf::is_encodable(record.image_identifier()) {
            return Err(PipelineError::validation(
                "image_name",
                "contains characters the report font cannot print",
            ));
        }
        if overlay.image.width() == 0 || overlay.image.height() == 0 {
            return Err(PipelineError::validation("overlay", "overlay image is empty"));
        }

        let page = layout(record, overlay);
        let bytes = pdf::render_single_page(page, "AI Prediction Report");

        log::debug!(
            "Report for {} rendered ({} bytes)",
            record.image_identifier(),
            bytes.len()
        );

        Ok(ReportDocument {
            bytes,
            filename: REPORT_FILENAME,
            mime: REPORT_MIME,
        })
    }

    /// Same as `generate` for a record supplied from outside the pipeline
    pub fn generate_from(&self, record: ReportRecord, overlay: &Explanation) -> PipelineResult<ReportDocument> {
        let record = record.into_record(&self.thresholds)?;
        self.generate(&record, overlay)
    }
}

fn category_color(category: ConfidenceCategory) -> [f32; 3] {
    match category {
        ConfidenceCategory::High => [0.18, 0.55, 0.34],
        ConfidenceCategory::Moderate => [0.85, 0.60, 0.10],
        ConfidenceCategory::Low => [0.78, 0.20, 0.20],
    }
}

fn thumbnail(overlay: &RgbImage) -> RgbImage {
    let (w, h) = overlay.dimensions();
    let longest = w.max(h);
    if longest <= THUMBNAIL_MAX {
        return overlay.clone();
    }
    let scale = THUMBNAIL_MAX as f32 / longest as f32;
    let tw = ((w as f32 * scale).round() as u32).max(1);
    let th = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(overlay, tw, th, FilterType::Triangle)
}

fn layout(record: &InferenceRecord, overlay: &Explanation) -> PageContent {
    let mut page = PageContent::new();
    let label = record.predicted_label();
    let category = record.confidence_category();
    let mut y = PAGE_HEIGHT - 70.0;

    page.text(MARGIN, y, 20.0, Font::Bold, &format!("{} - AI Prediction Report", APP_NAME));
    y -= 12.0;
    page.line(MARGIN, y, PAGE_WIDTH - MARGIN, y);
    y -= 24.0;

    page.text(MARGIN, y, 11.0, Font::Regular, &format!("Date: {}", record.formatted_timestamp()));
    y -= 16.0;
    for line in pdf::wrap(&format!("Image: {}", record.image_identifier()), IMAGE_WRAP) {
        page.text(MARGIN, y, 11.0, Font::Regular, &line);
        y -= 14.0;
    }
    y -= 16.0;

    page.text(MARGIN, y, 14.0, Font::Bold, &format!("Predicted Class: {}", label));
    y -= 16.0;
    page.text(MARGIN, y, 10.0, Font::Regular, label.clinical_name());
    y -= 22.0;
    page.text(
        MARGIN,
        y,
        12.0,
        Font::Regular,
        &format!("Confidence: {:.2}%", record.confidence() * 100.0),
    );
    y -= 18.0;
    page.fill_rect(MARGIN, y - 2.0, 10.0, 10.0, category_color(category));
    page.text(MARGIN + 16.0, y, 12.0, Font::Bold, &format!("Confidence Level: {}", category));
    y -= 16.0;
    for line in pdf::wrap(record.message(), DISCLAIMER_WRAP) {
        page.text(MARGIN, y, 10.0, Font::Regular, &line);
        y -= 13.0;
    }
    y -= 16.0;

    page.text(MARGIN, y, 13.0, Font::Bold, "Probability Breakdown");
    y -= 18.0;
    for (entry, p) in record.probability_distribution().iter() {
        let font = if entry == label { Font::Bold } else { Font::Regular };
        page.text(MARGIN, y, 10.0, font, entry.as_str());
        page.fill_rect(MARGIN + 130.0, y - 1.0, BAR_WIDTH, 9.0, [0.90, 0.90, 0.90]);
        page.fill_rect(MARGIN + 130.0, y - 1.0, BAR_WIDTH * p as f32, 9.0, [0.20, 0.40, 0.75]);
        page.text(MARGIN + 140.0 + BAR_WIDTH, y, 10.0, font, &format!("{:.2}%", p * 100.0));
        y -= 16.0;
    }
    y -= 16.0;

    page.text(MARGIN, y, 13.0, Font::Bold, "Explanation Overlay");
    y -= 10.0;
    let thumb = thumbnail(&overlay.image);
    let (tw, th) = (thumb.width() as f32, thumb.height() as f32);
    y -= th;
    page.image(MARGIN, y, tw, th, thumb);
    y -= 14.0;
    if overlay.clinically_valid {
        page.text(MARGIN, y, 9.0, Font::Regular, &format!("Method: {}", overlay.strategy));
        y -= 12.0;
    } else {
        for line in pdf::wrap(PLACEHOLDER_CAPTION, DISCLAIMER_WRAP) {
            page.text(MARGIN, y, 9.0, Font::Bold, &line);
            y -= 12.0;
        }
    }
    y -= 18.0;

    // One sentence per run so no statement is split across lines
    for sentence in CLINICAL_DISCLAIMER.split_inclusive(". ") {
        for line in pdf::wrap(sentence, DISCLAIMER_WRAP) {
            page.text(MARGIN, y, 9.0, Font::Regular, &line);
            y -= 12.0;
        }
    }

    page
}
