//! Upload intake: route by file type, derive and classify claims, persist.

pub mod csv;
pub mod pdf;

use crate::config::AppConfig;
use crate::error::{IntakeError, Result};
use crate::feature_deriver::{DerivedBatch, FeatureDeriver};
use crate::metrics::IntakeMetrics;
use crate::models::inference::{ClaimClassifier, Classification};
use crate::producer::AlertProducer;
use crate::storage::InvoiceStore;
use crate::types::alert::FraudAlert;
use crate::types::claim::{ClaimRow, ClassifiedClaim};
use crate::types::invoice::{ExtractedPayload, FraudStatus, InvoiceSummary, UploadResponse};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Csv,
    Pdf,
}

impl UploadKind {
    /// Pick the format from the file extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(UploadKind::Csv)
        } else if lower.ends_with(".pdf") {
            Ok(UploadKind::Pdf)
        } else {
            Err(IntakeError::UnsupportedFileType(filename.to_string()))
        }
    }
}

/// Final path component of a client-supplied filename.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(IntakeError::InvalidInput("Upload has no filename".to_string()));
    }
    Ok(base.to_string())
}

/// Claim rows after classification, plus how many needed the fallback label
#[derive(Debug, Clone)]
pub struct ClaimBatchOutcome {
    pub claims: Vec<ClassifiedClaim>,
    pub fallback_encodings: usize,
}

/// Derive-then-classify over one whole batch.
pub struct ClaimPipeline {
    deriver: FeatureDeriver,
    classifier: ClaimClassifier,
}

impl ClaimPipeline {
    pub fn new(deriver: FeatureDeriver, classifier: ClaimClassifier) -> Self {
        Self { deriver, classifier }
    }

    pub fn classifier(&self) -> &ClaimClassifier {
        &self.classifier
    }

    /// Batch statistics are final before the first row is classified.
    pub fn run(&self, rows: &[ClaimRow]) -> Result<ClaimBatchOutcome> {
        let batch = self.deriver.derive(rows)?;
        let results = self.classifier.classify_batch(&batch);
        Ok(Self::outcome(&batch, &results))
    }

    /// Like [`run`](Self::run), but stops between rows once `budget` has
    /// elapsed and reports [`IntakeError::Timeout`].
    pub fn run_within(&self, rows: &[ClaimRow], budget: Duration) -> Result<ClaimBatchOutcome> {
        let deadline = Instant::now() + budget;
        let batch = self.deriver.derive(rows)?;

        let mut results = Vec::with_capacity(batch.len());
        for row in batch.rows() {
            if Instant::now() >= deadline {
                return Err(IntakeError::Timeout(budget.as_millis() as u64));
            }
            results.push(self.classifier.classify(row));
        }
        Ok(Self::outcome(&batch, &results))
    }

    fn outcome(batch: &DerivedBatch, results: &[Classification]) -> ClaimBatchOutcome {
        let fallback_encodings = results.iter().filter(|r| r.diagnosis.is_fallback()).count();
        let claims = batch
            .rows()
            .iter()
            .zip(results)
            .map(|(row, result)| ClassifiedClaim::new(row, result.status))
            .collect();

        ClaimBatchOutcome {
            claims,
            fallback_encodings,
        }
    }
}

/// Request-facing intake operations, shared by all handlers.
pub struct IntakeService {
    pipeline: Arc<ClaimPipeline>,
    store: Arc<dyn InvoiceStore>,
    upload_dir: PathBuf,
    batch_timeout: Duration,
    alerts: Option<AlertProducer>,
    metrics: Arc<IntakeMetrics>,
}

impl IntakeService {
    pub fn new(
        pipeline: ClaimPipeline,
        store: Arc<dyn InvoiceStore>,
        upload_dir: impl Into<PathBuf>,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            upload_dir: upload_dir.into(),
            batch_timeout,
            alerts: None,
            metrics: Arc::new(IntakeMetrics::new()),
        }
    }

    /// Build the service from configuration and already-loaded collaborators
    pub fn from_config(
        config: &AppConfig,
        classifier: ClaimClassifier,
        store: Arc<dyn InvoiceStore>,
    ) -> Self {
        let pipeline = ClaimPipeline::new(FeatureDeriver::from_config(&config.detection), classifier);
        Self::new(
            pipeline,
            store,
            &config.storage.upload_dir,
            Duration::from_millis(config.pipeline.timeout_ms),
        )
    }

    /// Publish fraud alerts through `producer`
    pub fn with_alerts(mut self, producer: AlertProducer) -> Self {
        self.alerts = Some(producer);
        self
    }

    /// Share an existing metrics collector
    pub fn with_metrics(mut self, metrics: Arc<IntakeMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<IntakeMetrics> {
        &self.metrics
    }

    pub fn pipeline(&self) -> &ClaimPipeline {
        &self.pipeline
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Process one uploaded file and persist what was extracted.
    ///
    /// Nothing is stored when the upload is rejected.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let result = self.process_upload(filename, bytes).await;
        match &result {
            Ok(response) => {
                self.metrics.record_upload();
                info!(
                    invoice_id = response.invoice_id,
                    filename = %response.filename,
                    claims = response.extracted_data.claim_count(),
                    fraudulent = response.extracted_data.fraudulent_count(),
                    "Upload accepted"
                );
            }
            Err(e) if e.is_client_error() => {
                self.metrics.record_rejection();
                warn!(filename = %filename, error = %e, "Upload rejected");
            }
            Err(_) => self.metrics.record_rejection(),
        }
        result
    }

    async fn process_upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let filename = sanitize_filename(filename)?;
        let kind = UploadKind::from_filename(&filename)?;

        self.save_upload(&filename, &bytes).await?;

        let payload = match kind {
            UploadKind::Pdf => {
                let text = tokio::task::spawn_blocking(move || pdf::extract_text(&bytes))
                    .await
                    .context("PDF extraction task failed")??;
                ExtractedPayload::Text(text)
            }
            UploadKind::Csv => ExtractedPayload::Data(self.classify_csv(bytes).await?),
        };

        let store = self.store.clone();
        let name = filename.clone();
        let stored = tokio::task::spawn_blocking(move || store.insert(&name, &payload))
            .await
            .context("Storage task failed")??;

        if let Some(producer) = &self.alerts {
            if let Some(alert) = FraudAlert::for_payload(stored.id, &stored.filename, &stored.extracted_data) {
                if let Err(e) = producer.publish(&alert).await {
                    error!(invoice_id = stored.id, error = %e, "Failed to publish fraud alert");
                }
            }
        }

        Ok(stored.into())
    }

    /// Parse, derive and classify a CSV upload within the batch time bound.
    ///
    /// The blocking task checks the same bound between rows, so a batch that
    /// overruns stops classifying instead of finishing after the 504.
    async fn classify_csv(&self, bytes: Vec<u8>) -> Result<Vec<ClassifiedClaim>> {
        let pipeline = self.pipeline.clone();
        let budget = self.batch_timeout;
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            let rows = csv::parse_claims(&bytes)?;
            pipeline.run_within(&rows, budget)
        });

        let outcome = tokio::time::timeout(self.batch_timeout, task)
            .await
            .map_err(|_| IntakeError::Timeout(self.batch_timeout.as_millis() as u64))?
            .context("Classification task failed")??;

        let statuses: Vec<FraudStatus> = outcome.claims.iter().map(|c| c.fraud_status).collect();
        self.metrics
            .record_batch(started.elapsed(), &statuses, outcome.fallback_encodings);

        Ok(outcome.claims)
    }

    async fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", self.upload_dir.display()))?;
        let path = self.upload_dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to save upload {}", path.display()))?;
        Ok(())
    }

    /// Look up a stored invoice
    pub async fn get(&self, id: i64) -> Result<UploadResponse> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.get(id))
            .await
            .context("Storage task failed")??
            .map(UploadResponse::from)
            .ok_or(IntakeError::NotFound(id))
    }

    /// Summaries of all stored invoices, oldest first
    pub async fn list(&self) -> Result<Vec<InvoiceSummary>> {
        let store = self.store.clone();
        let invoices = tokio::task::spawn_blocking(move || store.list())
            .await
            .context("Storage task failed")??;
        Ok(invoices.iter().map(InvoiceSummary::from).collect())
    }
}
