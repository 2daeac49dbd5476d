//! Model Manifest
//!
//! JSON sidecar describing the weights artifact. Loading checks that the
//! weights are intact and were trained with the same label order and
//! preprocessing as this build.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::{DiseaseLabel, LABEL_COUNT};
use crate::logic::error::{PipelineError, PipelineResult};
use crate::logic::preprocess::PreprocessSpec;

/// Output tensor names of the exported graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNames {
    pub logits: String,
    /// Last convolutional activations, (1, C, h, w)
    #[serde(default)]
    pub activations: Option<String>,
    /// Gradients of each class score w.r.t. the activations, (classes, C, h, w)
    #[serde(default)]
    pub gradients: Option<String>,
}

impl OutputNames {
    pub fn has_activation_maps(&self) -> bool {
        self.activations.is_some() && self.gradients.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    /// Relative to the manifest's directory
    pub weights: PathBuf,
    pub sha256: String,
    pub labels: Vec<String>,
    pub preprocess: PreprocessSpec,
    #[serde(default)]
    pub input_name: Option<String>,
    pub outputs: OutputNames,
}

/// Manifest plus verified weight bytes
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub manifest: ModelManifest,
    pub weights: Vec<u8>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn unavailable(msg: String) -> PipelineError {
    PipelineError::ModelUnavailable(msg)
}

impl ModelManifest {
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| unavailable(format!("cannot read manifest {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| unavailable(format!("invalid manifest {}: {}", path.display(), e)))
    }

    /// Label order must match `DiseaseLabel::ALL` exactly
    pub fn check_labels(&self) -> PipelineResult<()> {
        if self.labels.len() != LABEL_COUNT {
            return Err(unavailable(format!(
                "manifest lists {} labels, expected {}",
                self.labels.len(),
                LABEL_COUNT
            )));
        }
        for (i, name) in self.labels.iter().enumerate() {
            match DiseaseLabel::parse(name) {
                Some(label) if label.index() == i => {}
                _ => {
                    return Err(unavailable(format!(
                        "label {} is '{}', expected '{}'",
                        i,
                        name,
                        DiseaseLabel::ALL[i]
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn check_preprocess(&self, expected: &PreprocessSpec) -> PipelineResult<()> {
        match expected.mismatch(&self.preprocess) {
            Some(diff) => Err(unavailable(format!("preprocessing drift: {}", diff))),
            None => Ok(()),
        }
    }
}

/// Read the manifest and its weights, verifying checksum, labels and preprocessing
pub fn load_model(manifest_path: &Path, expected: &PreprocessSpec) -> PipelineResult<LoadedModel> {
    log::info!("Loading model manifest from: {}", manifest_path.display());

    let manifest = ModelManifest::from_file(manifest_path)?;
    manifest.check_labels()?;
    manifest.check_preprocess(expected)?;

    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let weights_path = base.join(&manifest.weights);
    let weights = fs::read(&weights_path)
        .map_err(|e| unavailable(format!("cannot read weights {}: {}", weights_path.display(), e)))?;

    let actual = sha256_hex(&weights);
    if !actual.eq_ignore_ascii_case(manifest.sha256.trim()) {
        return Err(unavailable(format!(
            "checksum mismatch for {}: expected {}, got {}",
            weights_path.display(),
            manifest.sha256,
            actual
        )));
    }

    log::info!(
        "Model '{}' verified ({} bytes, sha256 {})",
        manifest.name,
        weights.len(),
        &actual[..12]
    );

    Ok(LoadedModel { manifest, weights })
}
