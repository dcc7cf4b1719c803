//! Batch feature derivation for claim classification.
//!
//! Two of the derived features depend on the whole batch (earliest date of
//! service and the high-claim quantile), so a batch is always derived in one
//! pass before any of its rows is classified.

use crate::config::DetectionConfig;
use crate::error::{IntakeError, Result};
use crate::types::claim::{ClaimRow, DerivedClaimRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashSet;

/// Model input features, in the exact order the scaler and model were fit on.
pub const FEATURE_NAMES: [&str; 6] = [
    "claim_amount",
    "diagnosis",
    "claim_frequency",
    "high_claim",
    "suspicious_diagnosis",
    "days_since_service",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A derived batch together with the statistics it was derived with.
///
/// Only [`FeatureDeriver::derive`] builds one, so rows reaching the
/// classifier always carry final batch statistics.
#[derive(Debug, Clone)]
pub struct DerivedBatch {
    rows: Vec<DerivedClaimRow>,
    earliest_service: NaiveDate,
    high_claim_threshold: f64,
}

impl DerivedBatch {
    pub fn rows(&self) -> &[DerivedClaimRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<DerivedClaimRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Earliest date of service in the batch
    pub fn earliest_service(&self) -> NaiveDate {
        self.earliest_service
    }

    /// Claim amount a row must exceed to be a high claim; NaN when no row
    /// has an amount
    pub fn high_claim_threshold(&self) -> f64 {
        self.high_claim_threshold
    }
}

/// Derives batch-relative features from raw claim rows.
pub struct FeatureDeriver {
    high_claim_quantile: f64,
    suspicious_diagnoses: HashSet<String>,
}

impl FeatureDeriver {
    /// Create a deriver with the default constants (0.95 quantile,
    /// "Surgery" and "Cancer Treatment" flagged).
    pub fn new() -> Self {
        Self::from_config(&DetectionConfig::default())
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            high_claim_quantile: config.high_claim_quantile,
            suspicious_diagnoses: config.suspicious_diagnoses.iter().cloned().collect(),
        }
    }

    /// Whether a diagnosis is in the suspicious set
    pub fn is_suspicious(&self, diagnosis: &str) -> bool {
        self.suspicious_diagnoses.contains(diagnosis)
    }

    /// Derive features for a whole batch.
    ///
    /// Output has the same length and order as the input.
    pub fn derive(&self, rows: &[ClaimRow]) -> Result<DerivedBatch> {
        if rows.is_empty() {
            return Err(IntakeError::InvalidInput("Claim batch has no rows".to_string()));
        }

        let dates = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                parse_service_date(&row.date_of_service).ok_or_else(|| {
                    IntakeError::InvalidInput(format!(
                        "Unparseable Date of Service '{}' in row {}",
                        row.date_of_service,
                        i + 1
                    ))
                })
            })
            .collect::<Result<Vec<NaiveDate>>>()?;

        let earliest_service = dates
            .iter()
            .copied()
            .min()
            .ok_or_else(|| IntakeError::InvalidInput("Claim batch has no dates".to_string()))?;
        // Rows without a usable amount take no part in the threshold.
        let amounts: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.claim_amount)
            .filter(|a| a.is_finite())
            .collect();
        let high_claim_threshold = quantile(&amounts, self.high_claim_quantile);

        let derived = rows
            .iter()
            .zip(dates)
            .map(|(row, date)| DerivedClaimRow {
                claim_amount: row.claim_amount,
                diagnosis: row.diagnosis.clone(),
                date_of_service: date,
                claim_frequency: row.claim_frequency.unwrap_or(1),
                days_since_service: (date - earliest_service).num_days(),
                high_claim: row
                    .claim_amount
                    .is_some_and(|amount| amount > high_claim_threshold),
                suspicious_diagnosis: self.is_suspicious(&row.diagnosis),
            })
            .collect();

        Ok(DerivedBatch {
            rows: derived,
            earliest_service,
            high_claim_threshold,
        })
    }

    /// Get the number of model input features.
    pub fn feature_count(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Get feature names in model input order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Quantile with linear interpolation between the closest ranks.
///
/// Returns NaN for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Parse a date of service; date-time inputs keep only their date part.
pub fn parse_service_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}
