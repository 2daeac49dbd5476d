//! Inference Pipeline
//!
//! Turns one upload into one `InferenceRecord` and appends it to the caller's
//! session. CPU-bound work runs on the blocking pool; the append happens
//! after the last await with nothing in between, so a dropped request leaves
//! the ledger untouched.

use std::sync::Arc;

use crate::logic::config::PipelineConfig;
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::explain::{build_strategy, Explanation, ExplanationKind, ExplanationStrategy};
use crate::logic::history::Session;
use crate::logic::model::{load_model, ClassifierService, ConfidenceThresholds, DiseaseLabel, EngineStatus};
use crate::logic::preprocess::ImagePreprocessor;
use crate::logic::record::InferenceRecord;
use crate::logic::report::{ReportDocument, ReportGenerator};

/// One uploaded image
#[derive(Debug, Clone)]
pub struct Upload {
    pub image_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(image_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            image_name: image_name.into(),
            bytes,
        }
    }
}

struct Inference {
    record: InferenceRecord,
    report: Option<ReportDocument>,
}

pub struct InferencePipeline {
    preprocessor: ImagePreprocessor,
    classifier: Arc<ClassifierService>,
    explainer: Arc<dyn ExplanationStrategy>,
    reporter: ReportGenerator,
    thresholds: ConfidenceThresholds,
}

impl InferencePipeline {
    /// Load the verified model named by the config and wire every stage
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let preprocessor = ImagePreprocessor::new();
        let model = load_model(&config.manifest_path, preprocessor.spec())?;
        let classifier = Arc::new(ClassifierService::from_model(&model, config.session_pool)?);
        Self::new(classifier, config.explanation, config.thresholds)
    }

    pub fn new(
        classifier: Arc<ClassifierService>,
        explanation: ExplanationKind,
        thresholds: ConfidenceThresholds,
    ) -> PipelineResult<Self> {
        thresholds.validate()?;
        let preprocessor = ImagePreprocessor::new();
        let explainer = build_strategy(explanation, classifier.clone(), preprocessor.clone())?;

        log::info!(
            "Pipeline ready (explanation: {}, thresholds high={} moderate={})",
            explainer.name(),
            thresholds.high,
            thresholds.moderate
        );

        Ok(Self {
            preprocessor,
            classifier,
            explainer,
            reporter: ReportGenerator::new(thresholds),
            thresholds,
        })
    }

    pub fn status(&self) -> EngineStatus {
        self.classifier.status()
    }

    /// Classify one upload and append the record to the session history
    pub async fn predict(&self, session: &Session, upload: Upload) -> PipelineResult<Arc<InferenceRecord>> {
        let inference = self.infer(upload, false).await?;
        Ok(self.commit(session, inference.record))
    }

    /// Classify, explain and render the report; the record is appended only
    /// when the report was produced
    pub async fn predict_and_report(
        &self,
        session: &Session,
        upload: Upload,
    ) -> PipelineResult<(Arc<InferenceRecord>, ReportDocument)> {
        let inference = self.infer(upload, true).await?;
        let report = inference
            .report
            .ok_or_else(|| PipelineError::InternalInferenceError("report stage produced nothing".to_string()))?;
        Ok((self.commit(session, inference.record), report))
    }

    /// Overlay for an arbitrary label; nothing is recorded
    pub async fn explain(&self, bytes: Vec<u8>, label: DiseaseLabel) -> PipelineResult<Explanation> {
        let preprocessor = self.preprocessor.clone();
        let explainer = self.explainer.clone();

        tokio::task::spawn_blocking(move || {
            let image = preprocessor.decode(&bytes)?;
            explainer.render(&image, label)
        })
        .await
        .map_err(join_error)?
    }

    pub fn generate_report(&self, record: &InferenceRecord, overlay: &Explanation) -> PipelineResult<ReportDocument> {
        self.reporter.generate(record, overlay)
    }

    async fn infer(&self, upload: Upload, with_report: bool) -> PipelineResult<Inference> {
        let preprocessor = self.preprocessor.clone();
        let classifier = self.classifier.clone();
        let explainer = self.explainer.clone();
        let reporter = self.reporter.clone();
        let thresholds = self.thresholds;

        tokio::task::spawn_blocking(move || {
            let image = preprocessor.decode(&upload.bytes)?;
            let tensor = preprocessor.preprocess(&image)?;
            let prediction = classifier.predict(&tensor)?;

            let timestamp = chrono::Local::now().naive_local();
            let record = InferenceRecord::new(upload.image_name, &prediction, &thresholds, timestamp)?;

            let report = if with_report {
                let overlay = explainer.render(&image, record.predicted_label())?;
                Some(reporter.generate(&record, &overlay)?)
            } else {
                None
            };

            Ok(Inference { record, report })
        })
        .await
        .map_err(join_error)?
    }

    fn commit(&self, session: &Session, record: InferenceRecord) -> Arc<InferenceRecord> {
        let record = Arc::new(record);
        let position = session.ledger().append(record.clone());
        log::info!(
            "Session {} #{}: {} -> {} ({:.4}, {})",
            session.id(),
            position,
            record.image_identifier(),
            record.predicted_label(),
            record.confidence(),
            record.confidence_category()
        );
        record
    }
}

fn join_error(err: tokio::task::JoinError) -> PipelineError {
    PipelineError::InternalInferenceError(format!("worker task failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::explain::encode_png;
    use crate::logic::model::{ClassifierBackend, ConfidenceCategory, InferenceError};
    use image::{Rgb, RgbImage};
    use ndarray::Array4;
    use std::time::Duration;

    struct FixedLogits(Vec<f32>);

    impl ClassifierBackend for FixedLogits {
        fn name(&self) -> &str {
            "fixed"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    impl ClassifierBackend for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(vec![0.0, 0.0, 0.0, 0.0, 1.0])
        }
    }

    fn logits_for(p: [f64; 5]) -> Vec<f32> {
        p.iter().map(|v| v.ln() as f32).collect()
    }

    fn pipeline_with(backend: impl ClassifierBackend + 'static) -> InferencePipeline {
        let classifier = Arc::new(ClassifierService::new(Arc::new(backend)));
        InferencePipeline::new(classifier, ExplanationKind::Placeholder, ConfidenceThresholds::default()).unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))).unwrap()
    }

    #[tokio::test]
    async fn test_successful_predictions_are_recorded_in_order() {
        let pipeline = pipeline_with(FixedLogits(logits_for([0.05, 0.03, 0.02, 0.02, 0.88])));
        let session = Session::new();

        for i in 0..4 {
            pipeline.predict(&session, Upload::new(format!("scan_{}.png", i), png(64, 48))).await.unwrap();
        }

        let history = session.ledger().entries();
        assert_eq!(history.len(), 4);
        let names: Vec<&str> = history.iter().map(|h| h.image_name.as_str()).collect();
        assert_eq!(names, vec!["scan_0.png", "scan_1.png", "scan_2.png", "scan_3.png"]);
    }

    #[tokio::test]
    async fn test_undecodable_input_leaves_no_trace() {
        let pipeline = pipeline_with(FixedLogits(vec![0.0; 5]));
        let session = Session::new();

        let err = pipeline
            .predict_and_report(&session, Upload::new("notes.txt", b"not an image".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InputError(_)));
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_unprintable_name_fails_report_without_append() {
        let pipeline = pipeline_with(FixedLogits(logits_for([0.05, 0.03, 0.02, 0.02, 0.88])));
        let session = Session::new();

        let err = pipeline
            .predict_and_report(&session, Upload::new("扫描.png", png(32, 32)))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidationError { ref field, .. } if field == "image_name"));
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_failed_forward_pass_does_not_append() {
        let pipeline = pipeline_with(FixedLogits(vec![0.0; 3]));
        let session = Session::new();

        let err = pipeline.predict(&session, Upload::new("a.png", png(32, 32))).await.unwrap_err();
        assert!(matches!(err, PipelineError::InternalInferenceError(_)));
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_normal_high_confidence() {
        let pipeline = pipeline_with(FixedLogits(logits_for([0.05, 0.03, 0.02, 0.02, 0.88])));
        let session = Session::new();

        let (record, report) = pipeline
            .predict_and_report(&session, Upload::new("mri_017.png", png(256, 256)))
            .await
            .unwrap();

        assert_eq!(record.predicted_label(), DiseaseLabel::Normal);
        assert!((record.confidence() - 0.88).abs() < 1e-6);
        assert_eq!(record.confidence_category(), ConfidenceCategory::High);

        let text = String::from_utf8_lossy(&report.bytes);
        assert!(text.contains("Normal"));
        assert!(text.contains("88.00%"));
        assert!(text.contains("Placeholder pattern"));
        assert_eq!(session.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_request_is_not_recorded() {
        let pipeline = pipeline_with(Slow);
        let session = Session::new();

        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            pipeline.predict(&session, Upload::new("slow.png", png(32, 32))),
        )
        .await;
        assert!(attempt.is_err());

        // Let the orphaned blocking task finish
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_explain_keeps_dimensions() {
        let pipeline = pipeline_with(FixedLogits(vec![0.0; 5]));
        let overlay = pipeline.explain(png(100, 60), DiseaseLabel::NF1).await.unwrap();
        assert_eq!(overlay.image.dimensions(), (100, 60));
        assert_eq!(overlay.strategy, "placeholder");
        assert!(!overlay.clinically_valid);
    }

    #[tokio::test]
    async fn test_report_regenerates_identically_from_history() {
        let pipeline = pipeline_with(FixedLogits(logits_for([0.7, 0.1, 0.1, 0.05, 0.05])));
        let session = Session::new();
        let record = pipeline.predict(&session, Upload::new("x.png", png(40, 40))).await.unwrap();
        assert_eq!(record.confidence_category(), ConfidenceCategory::Moderate);

        let overlay = Explanation::new(RgbImage::from_pixel(40, 40, Rgb([10, 20, 30])), "placeholder", false);
        let a = pipeline.generate_report(&record, &overlay).unwrap();
        let b = pipeline.generate_report(&record, &overlay).unwrap();
        assert_eq!(a, b);
    }
}
