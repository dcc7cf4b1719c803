//! Claim record structures, from raw CSV row to classified output

use crate::types::invoice::FraudStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One medical billing record as read from the source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRow {
    /// Claimed amount in currency units; `None` when the cell is blank or
    /// not a number
    pub claim_amount: Option<f64>,

    /// Diagnosis label, free text from the source data
    pub diagnosis: String,

    /// Date of service exactly as it appeared in the source
    pub date_of_service: String,

    /// Number of claims filed; `None` when the column or cell is absent
    pub claim_frequency: Option<u32>,
}

impl ClaimRow {
    /// Create a claim row without a claim frequency
    pub fn new(claim_amount: f64, diagnosis: &str, date_of_service: &str) -> Self {
        Self {
            claim_amount: Some(claim_amount),
            diagnosis: diagnosis.to_string(),
            date_of_service: date_of_service.to_string(),
            claim_frequency: None,
        }
    }

    /// Create a claim row whose amount cell was unreadable
    pub fn without_amount(diagnosis: &str, date_of_service: &str) -> Self {
        Self {
            claim_amount: None,
            ..Self::new(0.0, diagnosis, date_of_service)
        }
    }

    /// Set the claim frequency
    pub fn with_frequency(mut self, claim_frequency: u32) -> Self {
        self.claim_frequency = Some(claim_frequency);
        self
    }
}

/// Claim row plus the features derived from its batch.
///
/// `days_since_service` and `high_claim` are relative to the batch the row
/// was derived in; the same claim in another batch may get other values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedClaimRow {
    pub claim_amount: Option<f64>,
    pub diagnosis: String,
    pub date_of_service: NaiveDate,
    /// Defaults to 1 when absent from the source
    pub claim_frequency: u32,
    /// Days since the earliest date of service in the batch
    pub days_since_service: i64,
    /// Amount exceeds the batch's high-claim quantile
    pub high_claim: bool,
    /// Diagnosis belongs to the suspicious set
    pub suspicious_diagnosis: bool,
}

/// Output record for one classified claim, keyed like the source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedClaim {
    #[serde(rename = "Claim Amount")]
    pub claim_amount: Option<f64>,

    #[serde(rename = "Diagnosis")]
    pub diagnosis: String,

    #[serde(rename = "Claim Frequency")]
    pub claim_frequency: u32,

    #[serde(rename = "High Claim")]
    pub high_claim: u8,

    #[serde(rename = "Suspicious Diagnosis")]
    pub suspicious_diagnosis: u8,

    #[serde(rename = "Days Since Service")]
    pub days_since_service: i64,

    #[serde(rename = "Fraud_Status")]
    pub fraud_status: FraudStatus,
}

impl ClassifiedClaim {
    /// Attach a classification result to a derived row
    pub fn new(row: &DerivedClaimRow, fraud_status: FraudStatus) -> Self {
        Self {
            claim_amount: row.claim_amount,
            diagnosis: row.diagnosis.clone(),
            claim_frequency: row.claim_frequency,
            high_claim: u8::from(row.high_claim),
            suspicious_diagnosis: u8::from(row.suspicious_diagnosis),
            days_since_service: row.days_since_service,
            fraud_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_claim_uses_source_column_names() {
        let row = DerivedClaimRow {
            claim_amount: Some(5000.0),
            diagnosis: "Surgery".to_string(),
            date_of_service: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            claim_frequency: 1,
            days_since_service: 9,
            high_claim: true,
            suspicious_diagnosis: true,
        };

        let json = serde_json::to_value(ClassifiedClaim::new(&row, FraudStatus::Fraudulent)).unwrap();

        assert_eq!(json["Claim Amount"], 5000.0);
        assert_eq!(json["High Claim"], 1);
        assert_eq!(json["Suspicious Diagnosis"], 1);
        assert_eq!(json["Days Since Service"], 9);
        assert_eq!(json["Fraud_Status"], "Fraudulent");
        assert!(json.get("Date of Service").is_none());
    }

    #[test]
    fn test_missing_amount_serializes_as_null() {
        let row = DerivedClaimRow {
            claim_amount: None,
            diagnosis: "Flu".to_string(),
            date_of_service: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            claim_frequency: 1,
            days_since_service: 1,
            high_claim: false,
            suspicious_diagnosis: false,
        };

        let claim = ClassifiedClaim::new(&row, FraudStatus::PredictionFailed);
        let json = serde_json::to_string(&claim).unwrap();
        assert!(json.contains("\"Claim Amount\":null"));

        let back: ClassifiedClaim = serde_json::from_str(&json).unwrap();
        assert_eq!(back, claim);
    }
}
