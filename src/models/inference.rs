//! Claim classifier: encode, scale and predict one derived claim row

use crate::feature_deriver::{DerivedBatch, FEATURE_NAMES};
use crate::models::encoder::{DiagnosisEncoder, EncodedDiagnosis};
use crate::models::loader::OnnxModel;
use crate::models::scaler::StandardScaler;
use crate::types::claim::DerivedClaimRow;
use crate::types::invoice::FraudStatus;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error};

/// A pre-fit binary classifier over the scaled feature vector.
pub trait BinaryModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Predict the class label (0 = valid) for one scaled feature vector
    fn predict(&self, features: &[f32]) -> Result<i64>;
}

impl BinaryModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, features: &[f32]) -> Result<i64> {
        use ort::value::Tensor;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        if let Some(output) = self.label_output.as_deref().and_then(|name| outputs.get(name)) {
            if let Ok((_, labels)) = output.try_extract_tensor::<i64>() {
                if let Some(&label) = labels.first() {
                    debug!(model = %self.name, label = label, "Extracted label");
                    return Ok(label);
                }
            }
        }

        // Exports without a usable label output: threshold the fraud class probability
        if let Some(output) = self
            .probability_output
            .as_deref()
            .and_then(|name| outputs.get(name))
        {
            let (shape, data) = output
                .try_extract_tensor::<f32>()
                .context("Probability output is not a float tensor")?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = match dims.last() {
                Some(&n) if n >= 2 => data.get(1).copied(),
                _ => data.first().copied(),
            }
            .ok_or_else(|| anyhow::anyhow!("Empty probability output"))?;

            debug!(model = %self.name, prob = prob, "Extracted fraud probability");
            return Ok(i64::from(prob >= 0.5));
        }

        anyhow::bail!("Model {} produced no readable output", self.name)
    }
}

/// Encoder, scaler and model from one training run.
///
/// Loaded once at startup and shared read-only for the life of the process.
pub struct ClassifierArtifacts {
    version: String,
    encoder: DiagnosisEncoder,
    scaler: StandardScaler,
    model: Box<dyn BinaryModel>,
}

impl ClassifierArtifacts {
    pub fn new(
        version: impl Into<String>,
        encoder: DiagnosisEncoder,
        scaler: StandardScaler,
        model: Box<dyn BinaryModel>,
    ) -> Result<Self> {
        if scaler.dimension() != FEATURE_NAMES.len() {
            anyhow::bail!(
                "Scaler was fit on {} features, the pipeline produces {}",
                scaler.dimension(),
                FEATURE_NAMES.len()
            );
        }
        Ok(Self {
            version: version.into(),
            encoder,
            scaler,
            model,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn encoder(&self) -> &DiagnosisEncoder {
        &self.encoder
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// Result of classifying one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: FraudStatus,
    /// How the diagnosis was encoded for the model
    pub diagnosis: EncodedDiagnosis,
}

/// Classifies derived claim rows with the shared artifacts.
#[derive(Clone)]
pub struct ClaimClassifier {
    artifacts: Arc<ClassifierArtifacts>,
}

impl ClaimClassifier {
    pub fn new(artifacts: Arc<ClassifierArtifacts>) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &ClassifierArtifacts {
        &self.artifacts
    }

    /// Assemble the unscaled model input, in [`FEATURE_NAMES`] order.
    ///
    /// A missing amount becomes NaN, which the scaler refuses.
    pub fn feature_vector(row: &DerivedClaimRow, diagnosis: EncodedDiagnosis) -> [f64; 6] {
        [
            row.claim_amount.unwrap_or(f64::NAN),
            diagnosis.code() as f64,
            f64::from(row.claim_frequency),
            f64::from(u8::from(row.high_claim)),
            f64::from(u8::from(row.suspicious_diagnosis)),
            row.days_since_service as f64,
        ]
    }

    /// Classify one row. Failures become [`FraudStatus::PredictionFailed`]
    /// for this row only.
    pub fn classify(&self, row: &DerivedClaimRow) -> Classification {
        let diagnosis = self.artifacts.encoder.encode(&row.diagnosis);

        let status = match self.predict(row, diagnosis) {
            Ok(label) => FraudStatus::from_label(label),
            Err(e) => {
                error!(
                    model = %self.artifacts.model.name(),
                    diagnosis = %row.diagnosis,
                    error = %e,
                    "Prediction failed"
                );
                FraudStatus::PredictionFailed
            }
        };

        Classification { status, diagnosis }
    }

    /// Classify every row of a derived batch, in order
    pub fn classify_batch(&self, batch: &DerivedBatch) -> Vec<Classification> {
        batch.rows().iter().map(|row| self.classify(row)).collect()
    }

    fn predict(&self, row: &DerivedClaimRow, diagnosis: EncodedDiagnosis) -> Result<i64> {
        let features = Self::feature_vector(row, diagnosis);
        debug!(features = ?features, "Features before scaling");

        let scaled = self.artifacts.scaler.transform(&features)?;
        self.artifacts.model.predict(&scaled)
    }
}
