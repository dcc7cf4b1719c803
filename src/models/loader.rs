//! Classifier artifact loader: manifest, encoder, scaler and ONNX model

use crate::config::{DetectionConfig, ModelsConfig};
use crate::feature_deriver::FEATURE_NAMES;
use crate::models::encoder::DiagnosisEncoder;
use crate::models::inference::ClassifierArtifacts;
use crate::models::scaler::StandardScaler;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Manifest written by the training run next to the exported model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Training run identifier
    pub version: String,
    /// Feature order the scaler and model were fit on
    pub feature_names: Vec<String>,
    pub encoder: EncoderArtifact,
    pub scaler: ScalerArtifact,
    /// ONNX model file, relative to the manifest
    pub model_file: String,
}

/// Fitted label encoder vocabulary; a class's code is its index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub classes: Vec<String>,
}

/// Fitted standardization statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ArtifactManifest {
    /// Read a manifest from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact manifest {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse artifact manifest {}", path.display()))
    }

    /// Check that the artifacts were produced for this pipeline's feature layout.
    pub fn check_compatibility(&self) -> Result<()> {
        if self.feature_names != FEATURE_NAMES {
            anyhow::bail!(
                "Artifact feature order {:?} does not match pipeline order {:?}",
                self.feature_names,
                FEATURE_NAMES
            );
        }
        for (name, len) in [("mean", self.scaler.mean.len()), ("scale", self.scaler.scale.len())] {
            if len != FEATURE_NAMES.len() {
                anyhow::bail!(
                    "Scaler {} has {} entries, expected {}",
                    name,
                    len,
                    FEATURE_NAMES.len()
                );
            }
        }
        Ok(())
    }

    /// Build the encoder and scaler described by the manifest
    pub fn preprocessing(&self, fallback_diagnosis: &str) -> Result<(DiagnosisEncoder, StandardScaler)> {
        self.check_compatibility()?;
        let encoder = DiagnosisEncoder::new(self.encoder.classes.clone(), fallback_diagnosis)
            .context("Invalid encoder artifact")?;
        let scaler = StandardScaler::new(self.scaler.mean.clone(), self.scaler.scale.clone())
            .context("Invalid scaler artifact")?;
        Ok((encoder, scaler))
    }
}

/// Loaded ONNX model with metadata
pub struct OnnxModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session; running it needs exclusive access
    pub session: Mutex<Session>,
    /// Input name for the model
    pub input_name: String,
    /// Output holding the predicted class, if the export has one
    pub label_output: Option<String>,
    /// Output holding class probabilities, if the export has one
    pub probability_output: Option<String>,
}

/// Loader for classifier artifacts
pub struct ArtifactLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ArtifactLoader {
    /// Create a new loader with default settings (1 thread)
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a new loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone());

        if label_output.is_none() && probability_output.is_none() {
            anyhow::bail!("Model {} exposes neither a label nor a probability output", name);
        }

        info!(
            model = %name,
            input = %input_name,
            label_output = ?label_output,
            probability_output = ?probability_output,
            "Model loaded successfully"
        );

        Ok(OnnxModel {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output,
        })
    }

    /// Load encoder, scaler and model together from the configured directory
    pub fn load_artifacts(
        &self,
        models: &ModelsConfig,
        detection: &DetectionConfig,
    ) -> Result<ClassifierArtifacts> {
        let manifest_path = models.manifest_path();
        let manifest = ArtifactManifest::from_path(&manifest_path)?;
        let (encoder, scaler) = manifest
            .preprocessing(&detection.fallback_diagnosis)
            .with_context(|| format!("Incompatible artifacts in {}", manifest_path.display()))?;

        let model_path = models.artifacts_dir.join(&manifest.model_file);
        let model = self.load_model(&model_path, "xgboost")?;

        info!(
            version = %manifest.version,
            classes = encoder.classes().len(),
            "Classifier artifacts loaded from {}",
            models.artifacts_dir.display()
        );

        ClassifierArtifacts::new(manifest.version, encoder, scaler, Box::new(model))
    }
}
