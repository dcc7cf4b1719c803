//! HTTP routes for upload and invoice lookup

use crate::error::IntakeError;
use crate::intake::IntakeService;
use crate::types::invoice::{InvoiceSummary, UploadResponse};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
struct AppState {
    service: Arc<IntakeService>,
    max_upload_bytes: usize,
}

/// Build the router over a shared intake service
pub fn router(service: Arc<IntakeService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload/", post(upload))
        .route("/invoice/{invoice_id}", get(get_invoice))
        .route("/invoices", get(list_invoices))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(AppState {
            service,
            max_upload_bytes,
        })
}

/// Body-limit overruns are 413; anything else wrong with the body is 400.
fn multipart_error(state: &AppState, context: &str, e: MultipartError) -> IntakeError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IntakeError::UploadTooLarge(state.max_upload_bytes)
    } else {
        IntakeError::InvalidInput(format!("{context}: {e}"))
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let artifacts = state.service.pipeline().classifier().artifacts();
    Json(serde_json::json!({
        "status": "healthy",
        "model": artifacts.model_name(),
        "model_version": artifacts.version(),
    }))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, IntakeError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, "Malformed multipart body", e))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(&state, "Failed to read upload", e))?;

        let response = state.service.upload(&filename, bytes.to_vec()).await?;
        return Ok(Json(response));
    }

    Err(IntakeError::InvalidInput(format!(
        "Multipart field '{UPLOAD_FIELD}' is required"
    )))
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<UploadResponse>, IntakeError> {
    state.service.get(invoice_id).await.map(Json)
}

async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, IntakeError> {
    state.service.list().await.map(Json)
}

/// Resolve on Ctrl-C
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
