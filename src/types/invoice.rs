//! Stored invoice and classification outcome structures

use crate::types::claim::ClassifiedClaim;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification outcome attached to one claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FraudStatus {
    #[serde(rename = "Valid")]
    Valid,
    #[serde(rename = "Fraudulent")]
    Fraudulent,
    #[serde(rename = "Prediction Failed - Check API Logs")]
    PredictionFailed,
}

impl FraudStatus {
    /// Map a binary model label: 0 is valid, anything else fraudulent
    pub fn from_label(label: i64) -> Self {
        if label == 0 {
            FraudStatus::Valid
        } else {
            FraudStatus::Fraudulent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FraudStatus::Valid => "Valid",
            FraudStatus::Fraudulent => "Fraudulent",
            FraudStatus::PredictionFailed => "Prediction Failed - Check API Logs",
        }
    }
}

impl std::fmt::Display for FraudStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was extracted from an upload: raw PDF text or classified CSV rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractedPayload {
    Text(String),
    Data(Vec<ClassifiedClaim>),
}

impl ExtractedPayload {
    /// Number of claim rows (zero for text payloads)
    pub fn claim_count(&self) -> usize {
        match self {
            ExtractedPayload::Text(_) => 0,
            ExtractedPayload::Data(rows) => rows.len(),
        }
    }

    /// Number of rows labeled fraudulent
    pub fn fraudulent_count(&self) -> usize {
        match self {
            ExtractedPayload::Text(_) => 0,
            ExtractedPayload::Data(rows) => rows
                .iter()
                .filter(|r| r.fraud_status == FraudStatus::Fraudulent)
                .count(),
        }
    }
}

/// Persisted invoice record; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInvoice {
    /// Store-assigned, monotonically increasing identifier
    pub id: i64,
    pub filename: String,
    pub extracted_data: ExtractedPayload,
    pub created_at: DateTime<Utc>,
}

/// Response body for upload and lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub invoice_id: i64,
    pub filename: String,
    pub extracted_data: ExtractedPayload,
}

impl From<StoredInvoice> for UploadResponse {
    fn from(invoice: StoredInvoice) -> Self {
        Self {
            invoice_id: invoice.id,
            filename: invoice.filename,
            extracted_data: invoice.extracted_data,
        }
    }
}

/// One entry of the invoice listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub invoice_id: i64,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub claims: usize,
    pub fraudulent: usize,
}

impl From<&StoredInvoice> for InvoiceSummary {
    fn from(invoice: &StoredInvoice) -> Self {
        Self {
            invoice_id: invoice.id,
            filename: invoice.filename.clone(),
            created_at: invoice.created_at,
            claims: invoice.extracted_data.claim_count(),
            fraudulent: invoice.extracted_data.fraudulent_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_status_from_label() {
        assert_eq!(FraudStatus::from_label(0), FraudStatus::Valid);
        assert_eq!(FraudStatus::from_label(1), FraudStatus::Fraudulent);
        assert_eq!(FraudStatus::from_label(7), FraudStatus::Fraudulent);
    }

    #[test]
    fn test_fraud_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&FraudStatus::PredictionFailed).unwrap(),
            "\"Prediction Failed - Check API Logs\""
        );
        assert_eq!(FraudStatus::Valid.to_string(), "Valid");
    }

    #[test]
    fn test_payload_shape() {
        let text = serde_json::to_value(ExtractedPayload::Text("hello".into())).unwrap();
        assert_eq!(text, serde_json::json!({ "text": "hello" }));

        let data = serde_json::to_value(ExtractedPayload::Data(Vec::new())).unwrap();
        assert_eq!(data, serde_json::json!({ "data": [] }));
    }
}
