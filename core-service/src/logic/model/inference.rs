//! Inference Engine - ONNX Runtime Integration
//!
//! `ClassifierService` owns read-only weights behind a `ClassifierBackend`
//! and turns a preprocessed tensor into a `Prediction`.
//! Backends are swappable: ONNX Runtime in production, fixed logits in tests.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array3, Array4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::manifest::{LoadedModel, OutputNames};
use super::types::{Prediction, ProbabilityDistribution, LABEL_COUNT};
use crate::constants::INPUT_SIZE;
use crate::logic::error::{PipelineError, PipelineResult};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub struct InferenceError(pub String);

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InferenceError: {}", self.0)
    }
}

impl std::error::Error for InferenceError {}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        PipelineError::InternalInferenceError(err.0)
    }
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Last-conv activations and per-class gradients, for Grad-CAM
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationMaps {
    /// (channels, h, w)
    pub activations: Array3<f32>,
    /// (classes, channels, h, w)
    pub gradients: Array4<f32>,
}

#[derive(Debug, Clone)]
pub struct ForwardOutput {
    pub logits: Vec<f32>,
    pub maps: Option<ActivationMaps>,
}

/// Engine Status for UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model_loaded: bool,
    pub model_name: String,
    pub inference_device: String,
    pub supports_activation_maps: bool,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
    pub failure_count: u64,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// Forward pass over fixed, read-only weights
pub trait ClassifierBackend: Send + Sync {
    fn name(&self) -> &str;

    fn device(&self) -> &str {
        "CPU"
    }

    /// Raw logits, one per label in `DiseaseLabel::ALL` order
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;

    fn supports_activation_maps(&self) -> bool {
        false
    }

    fn forward_with_maps(&self, input: &Array4<f32>) -> Result<ForwardOutput, InferenceError> {
        Ok(ForwardOutput {
            logits: self.forward(input)?,
            maps: None,
        })
    }
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX Runtime backend.
///
/// `Session::run` needs exclusive access, so a small pool of sessions is
/// built from the same weight bytes and handed out round-robin.
pub struct OnnxBackend {
    name: String,
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    input_name: Option<String>,
    outputs: OutputNames,
}

impl OnnxBackend {
    pub fn from_model(model: &LoadedModel, pool_size: usize) -> PipelineResult<Self> {
        let pool_size = pool_size.max(1);
        log::info!(
            "Building {} ONNX session(s) for '{}' ({} bytes)",
            pool_size,
            model.manifest.name,
            model.weights.len()
        );

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| PipelineError::ModelUnavailable(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| PipelineError::ModelUnavailable(format!("Failed to set optimization: {}", e)))?
                .commit_from_memory(&model.weights)
                .map_err(|e| PipelineError::ModelUnavailable(format!("Failed to load model: {}", e)))?;
            sessions.push(Mutex::new(session));
        }

        let backend = Self {
            name: model.manifest.name.clone(),
            sessions,
            next: AtomicUsize::new(0),
            input_name: model.manifest.input_name.clone(),
            outputs: model.manifest.outputs.clone(),
        };
        backend.check_outputs()?;

        log::info!("ONNX model loaded successfully");
        Ok(backend)
    }

    /// Every declared output must exist in the graph
    fn check_outputs(&self) -> PipelineResult<()> {
        let session = self.sessions[0].lock();
        let available: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        let declared = std::iter::once(&self.outputs.logits)
            .chain(self.outputs.activations.iter())
            .chain(self.outputs.gradients.iter());
        for name in declared {
            if !available.iter().any(|a| a == name) {
                return Err(PipelineError::ModelUnavailable(format!(
                    "graph has no output '{}' (available: {})",
                    name,
                    available.join(", ")
                )));
            }
        }
        Ok(())
    }

    fn run(&self, input: &Array4<f32>, with_maps: bool) -> Result<ForwardOutput, InferenceError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[slot].lock();

        let input_tensor = Tensor::from_array(input.clone())
            .map_err(|e| InferenceError(format!("Tensor error: {}", e)))?;

        let outputs = match &self.input_name {
            Some(name) => session.run(ort::inputs![name.as_str() => input_tensor]),
            None => session.run(ort::inputs![input_tensor]),
        }
        .map_err(|e| InferenceError(format!("Inference failed: {}", e)))?;

        let extract = |name: &str| -> Result<(Vec<i64>, Vec<f32>), InferenceError> {
            let value = outputs
                .get(name)
                .ok_or_else(|| InferenceError(format!("No output '{}'", name)))?;
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| InferenceError(format!("Extract error: {}", e)))?;
            Ok((shape.iter().copied().collect(), data.to_vec()))
        };

        let (_, logits) = extract(&self.outputs.logits)?;

        let maps = match (with_maps, &self.outputs.activations, &self.outputs.gradients) {
            (true, Some(act_name), Some(grad_name)) => {
                let (act_shape, act_data) = extract(act_name)?;
                let (_, grad_data) = extract(grad_name)?;
                Some(activation_maps_from_raw(&act_shape, act_data, grad_data)?)
            }
            (true, _, _) => return Err(InferenceError("model does not export activation maps".to_string())),
            (false, _, _) => None,
        };

        Ok(ForwardOutput { logits, maps })
    }
}

/// Reshape raw activations (.., C, h, w) and gradients (classes * C * h * w)
pub fn activation_maps_from_raw(
    act_shape: &[i64],
    activations: Vec<f32>,
    gradients: Vec<f32>,
) -> Result<ActivationMaps, InferenceError> {
    if act_shape.len() < 3 {
        return Err(InferenceError(format!("activation shape {:?} has fewer than 3 dims", act_shape)));
    }
    let dims: Vec<usize> = act_shape[act_shape.len() - 3..].iter().map(|&d| d.max(0) as usize).collect();
    let (channels, h, w) = (dims[0], dims[1], dims[2]);

    let activations = Array3::from_shape_vec((channels, h, w), activations)
        .map_err(|e| InferenceError(format!("Activation array error: {}", e)))?;
    let gradients = Array4::from_shape_vec((LABEL_COUNT, channels, h, w), gradients)
        .map_err(|e| InferenceError(format!("Gradient array error: {}", e)))?;

    Ok(ActivationMaps { activations, gradients })
}

impl ClassifierBackend for OnnxBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &str {
        "ONNX Runtime (CPU)"
    }

    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        Ok(self.run(input, false)?.logits)
    }

    fn supports_activation_maps(&self) -> bool {
        self.outputs.has_activation_maps()
    }

    fn forward_with_maps(&self, input: &Array4<f32>) -> Result<ForwardOutput, InferenceError> {
        self.run(input, true)
    }
}

// ============================================================================
// CLASSIFIER SERVICE
// ============================================================================

pub struct ClassifierService {
    backend: Arc<dyn ClassifierBackend>,
    loaded_at: chrono::DateTime<chrono::Utc>,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
    failure_count: AtomicU64,
}

impl ClassifierService {
    pub fn new(backend: Arc<dyn ClassifierBackend>) -> Self {
        Self {
            backend,
            loaded_at: chrono::Utc::now(),
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        }
    }

    /// Load verified weights into an ONNX backend
    pub fn from_model(model: &LoadedModel, pool_size: usize) -> PipelineResult<Self> {
        let backend = OnnxBackend::from_model(model, pool_size)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn supports_activation_maps(&self) -> bool {
        self.backend.supports_activation_maps()
    }

    /// Deterministic forward pass + softmax + argmax
    pub fn predict(&self, tensor: &Array4<f32>) -> PipelineResult<Prediction> {
        check_input_shape(tensor)?;
        let start = Instant::now();

        let result = self
            .guarded(|| self.backend.forward(tensor))
            .and_then(|logits| ProbabilityDistribution::from_logits(&logits));

        match result {
            Ok(distribution) => {
                self.latency_sum_us
                    .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
                self.inference_count.fetch_add(1, Ordering::Relaxed);
                Ok(Prediction::from_distribution(distribution))
            }
            Err(e) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                log::warn!("Forward pass failed: {}", e);
                Err(e)
            }
        }
    }

    /// Activation maps for Grad-CAM
    pub fn activation_maps(&self, tensor: &Array4<f32>) -> PipelineResult<ActivationMaps> {
        check_input_shape(tensor)?;
        let output = self.guarded(|| self.backend.forward_with_maps(tensor))?;
        output.maps.ok_or_else(|| {
            PipelineError::InternalInferenceError("backend returned no activation maps".to_string())
        })
    }

    /// Backend panics become per-call errors; the pool's mutexes do not poison
    fn guarded<T>(&self, f: impl FnOnce() -> Result<T, InferenceError>) -> PipelineResult<T> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result.map_err(PipelineError::from),
            Err(_) => Err(PipelineError::InternalInferenceError(format!(
                "backend '{}' panicked during forward pass",
                self.backend.name()
            ))),
        }
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        EngineStatus {
            model_loaded: true,
            model_name: self.backend.name().to_string(),
            inference_device: self.backend.device().to_string(),
            supports_activation_maps: self.backend.supports_activation_maps(),
            avg_latency_ms: avg,
            inference_count: count,
            failure_count: self.failure_count.load(Ordering::Relaxed),
            loaded_at: self.loaded_at,
        }
    }
}

fn check_input_shape(tensor: &Array4<f32>) -> PipelineResult<()> {
    let side = INPUT_SIZE as usize;
    if tensor.dim() != (1, 3, side, side) {
        return Err(PipelineError::InternalInferenceError(format!(
            "expected input (1, 3, {side}, {side}), got {:?}",
            tensor.dim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::types::DiseaseLabel;
    use std::sync::atomic::AtomicBool;

    struct FixedLogits(Vec<f32>);

    impl ClassifierBackend for FixedLogits {
        fn name(&self) -> &str {
            "fixed"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    /// Fails once, then recovers
    struct FlakyOnce {
        failed: AtomicBool,
    }

    impl ClassifierBackend for FlakyOnce {
        fn name(&self) -> &str {
            "flaky"
        }

        fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                panic!("simulated runtime fault");
            }
            Ok(vec![0.0, 0.0, 0.0, 0.0, 1.0])
        }
    }

    fn input() -> Array4<f32> {
        Array4::zeros((1, 3, 224, 224))
    }

    fn probability_logits(p: [f64; 5]) -> Vec<f32> {
        p.iter().map(|v| v.ln() as f32).collect()
    }

    #[test]
    fn test_predict_distribution_invariants() {
        let service = ClassifierService::new(Arc::new(FixedLogits(vec![0.3, 2.2, -1.0, 0.9, 1.1])));
        let prediction = service.predict(&input()).unwrap();

        let values = prediction.distribution.values();
        assert_eq!(values.len(), 5);
        assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-6);

        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(prediction.confidence, max);
        assert_eq!(prediction.label, DiseaseLabel::NF1);
        assert_eq!(prediction.label, prediction.distribution.argmax());
    }

    #[test]
    fn test_predict_recovers_known_probabilities() {
        let logits = probability_logits([0.05, 0.03, 0.02, 0.02, 0.88]);
        let service = ClassifierService::new(Arc::new(FixedLogits(logits)));
        let prediction = service.predict(&input()).unwrap();

        assert_eq!(prediction.label, DiseaseLabel::Normal);
        assert!((prediction.confidence - 0.88).abs() < 1e-6);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let service = ClassifierService::new(Arc::new(FixedLogits(vec![1.0, 2.0, 3.0, 4.0, 5.0])));
        assert_eq!(service.predict(&input()).unwrap(), service.predict(&input()).unwrap());
    }

    #[test]
    fn test_wrong_input_shape_is_internal_error() {
        let service = ClassifierService::new(Arc::new(FixedLogits(vec![0.0; 5])));
        let err = service.predict(&Array4::zeros((1, 3, 32, 32))).unwrap_err();
        assert!(matches!(err, PipelineError::InternalInferenceError(_)));
    }

    #[test]
    fn test_bad_logit_count_is_internal_error() {
        let service = ClassifierService::new(Arc::new(FixedLogits(vec![0.0; 3])));
        let err = service.predict(&input()).unwrap_err();
        assert!(matches!(err, PipelineError::InternalInferenceError(_)));
        assert_eq!(service.status().failure_count, 1);
    }

    #[test]
    fn test_service_survives_backend_panic() {
        let service = ClassifierService::new(Arc::new(FlakyOnce { failed: AtomicBool::new(false) }));

        let err = service.predict(&input()).unwrap_err();
        assert!(matches!(err, PipelineError::InternalInferenceError(_)));
        assert!(!err.is_fatal());

        let prediction = service.predict(&input()).unwrap();
        assert_eq!(prediction.label, DiseaseLabel::Normal);
        assert_eq!(service.status().inference_count, 1);
    }

    #[test]
    fn test_activation_maps_unsupported_by_default() {
        let service = ClassifierService::new(Arc::new(FixedLogits(vec![0.0; 5])));
        assert!(!service.supports_activation_maps());
        assert!(service.activation_maps(&input()).is_err());
    }

    #[test]
    fn test_concurrent_predictions_share_weights() {
        let service = Arc::new(ClassifierService::new(Arc::new(FixedLogits(vec![5.0, 0.0, 0.0, 0.0, 0.0]))));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                std::thread::spawn(move || service.predict(&input()).unwrap().label)
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), DiseaseLabel::MoyamoyaIVH);
        }
        assert_eq!(service.status().inference_count, 8);
    }

    #[test]
    fn test_activation_maps_from_raw_shapes() {
        let maps = activation_maps_from_raw(&[1, 2, 3, 3], vec![1.0; 18], vec![0.5; 5 * 18]).unwrap();
        assert_eq!(maps.activations.dim(), (2, 3, 3));
        assert_eq!(maps.gradients.dim(), (5, 2, 3, 3));

        assert!(activation_maps_from_raw(&[2, 3, 3], vec![1.0; 18], vec![0.5; 7]).is_err());
        assert!(activation_maps_from_raw(&[3, 3], vec![1.0; 9], vec![]).is_err());
    }
}
