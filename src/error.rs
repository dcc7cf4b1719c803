//! Error types surfaced by the intake service

use crate::storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Result type for intake operations
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Errors that abort a whole request.
///
/// Per-row classification failures are not errors at this level; they are
/// reported as [`crate::types::FraudStatus::PredictionFailed`].
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unsupported file format '{0}'. Upload a CSV or PDF.")]
    UnsupportedFileType(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Upload exceeds the {0} byte limit")]
    UploadTooLarge(usize),

    #[error("Invoice not found")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Claim batch exceeded the {0} ms processing bound")]
    Timeout(u64),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl IntakeError {
    /// HTTP status reported to the client
    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::InvalidInput(_)
            | IntakeError::UnsupportedFileType(_)
            | IntakeError::MissingColumns(_) => StatusCode::BAD_REQUEST,
            IntakeError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            IntakeError::NotFound(_) => StatusCode::NOT_FOUND,
            IntakeError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            IntakeError::Storage(_) | IntakeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the caller sent something we refuse to process
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_columns() {
        let err = IntakeError::MissingColumns(vec!["Diagnosis".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: Diagnosis");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(IntakeError::NotFound(7).status_code(), StatusCode::NOT_FOUND);
        assert!(IntakeError::UnsupportedFileType("notes.txt".into()).is_client_error());
        assert!(!IntakeError::Timeout(10).is_client_error());
        assert_eq!(
            IntakeError::UploadTooLarge(1024).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            IntakeError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
