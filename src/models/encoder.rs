//! Diagnosis label encoding

use anyhow::Result;
use std::collections::HashMap;
use tracing::warn;

/// Outcome of encoding a diagnosis.
///
/// `Fallback` carries the code of the configured fallback diagnosis and is
/// produced for labels outside the training vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedDiagnosis {
    Known(i64),
    Fallback(i64),
}

impl EncodedDiagnosis {
    pub fn code(&self) -> i64 {
        match self {
            EncodedDiagnosis::Known(code) | EncodedDiagnosis::Fallback(code) => *code,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EncodedDiagnosis::Fallback(_))
    }
}

/// Maps diagnosis labels to the integer codes the model was trained on.
///
/// The code of a label is its position in the training vocabulary.
#[derive(Debug, Clone)]
pub struct DiagnosisEncoder {
    classes: Vec<String>,
    codes: HashMap<String, i64>,
    fallback: String,
    fallback_code: i64,
}

impl DiagnosisEncoder {
    /// Build an encoder; the fallback diagnosis must be part of `classes`.
    pub fn new(classes: Vec<String>, fallback: &str) -> Result<Self> {
        if classes.is_empty() {
            anyhow::bail!("Encoder vocabulary is empty");
        }

        let mut codes = HashMap::with_capacity(classes.len());
        for (i, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), i as i64).is_some() {
                anyhow::bail!("Encoder vocabulary lists '{}' twice", class);
            }
        }

        let fallback_code = codes.get(fallback).copied().ok_or_else(|| {
            anyhow::anyhow!(
                "Fallback diagnosis '{}' is not in the encoder vocabulary",
                fallback
            )
        })?;

        Ok(Self {
            classes,
            codes,
            fallback: fallback.to_string(),
            fallback_code,
        })
    }

    /// Encode a diagnosis, substituting the fallback for unknown labels.
    pub fn encode(&self, diagnosis: &str) -> EncodedDiagnosis {
        match self.codes.get(diagnosis) {
            Some(&code) => EncodedDiagnosis::Known(code),
            None => {
                warn!(
                    diagnosis = %diagnosis,
                    fallback = %self.fallback,
                    "Unknown diagnosis, encoding fallback label"
                );
                EncodedDiagnosis::Fallback(self.fallback_code)
            }
        }
    }

    pub fn contains(&self, diagnosis: &str) -> bool {
        self.codes.contains_key(diagnosis)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}
