//! Fraud alert data structures

use crate::types::invoice::{ExtractedPayload, FraudStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fraud alert generated when an uploaded invoice contains fraudulent claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier
    pub alert_id: String,

    /// Stored invoice the claims belong to
    pub invoice_id: i64,

    /// Original upload filename
    pub filename: String,

    /// Number of claims in the invoice
    pub total_claims: usize,

    /// Zero-based positions of the fraudulent claims
    pub fraudulent_rows: Vec<usize>,

    /// Sum of the fraudulent claim amounts
    pub fraudulent_amount: f64,

    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl FraudAlert {
    /// Build an alert for a stored payload, or `None` if nothing was flagged
    pub fn for_payload(invoice_id: i64, filename: &str, payload: &ExtractedPayload) -> Option<Self> {
        let ExtractedPayload::Data(rows) = payload else {
            return None;
        };

        let flagged: Vec<(usize, f64)> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.fraud_status == FraudStatus::Fraudulent)
            .map(|(i, r)| (i, r.claim_amount.unwrap_or(0.0)))
            .collect();

        if flagged.is_empty() {
            return None;
        }

        Some(Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            invoice_id,
            filename: filename.to_string(),
            total_claims: rows.len(),
            fraudulent_rows: flagged.iter().map(|(i, _)| *i).collect(),
            fraudulent_amount: flagged.iter().map(|(_, a)| a).sum(),
            timestamp: Utc::now(),
        })
    }
}
