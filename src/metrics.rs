//! Performance metrics and statistics tracking for the intake service.

use crate::types::invoice::FraudStatus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for uploads and claim classification
pub struct IntakeMetrics {
    /// Uploads stored successfully
    pub uploads_accepted: AtomicU64,
    /// Uploads refused before anything was stored
    pub uploads_rejected: AtomicU64,
    /// Claim rows classified
    pub rows_classified: AtomicU64,
    /// Rows whose diagnosis was replaced by the fallback label
    pub fallback_encodings: AtomicU64,
    /// Rows by classification outcome
    rows_by_status: RwLock<HashMap<FraudStatus, u64>>,
    /// Batch processing times (in microseconds)
    batch_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl IntakeMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            uploads_accepted: AtomicU64::new(0),
            uploads_rejected: AtomicU64::new(0),
            rows_classified: AtomicU64::new(0),
            fallback_encodings: AtomicU64::new(0),
            rows_by_status: RwLock::new(HashMap::new()),
            batch_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a stored upload
    pub fn record_upload(&self) {
        self.uploads_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a refused upload
    pub fn record_rejection(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one classified batch
    pub fn record_batch(&self, processing_time: Duration, statuses: &[FraudStatus], fallbacks: usize) {
        self.rows_classified
            .fetch_add(statuses.len() as u64, Ordering::Relaxed);
        self.fallback_encodings
            .fetch_add(fallbacks as u64, Ordering::Relaxed);

        if let Ok(mut by_status) = self.rows_by_status.write() {
            for status in statuses {
                *by_status.entry(*status).or_insert(0) += 1;
            }
        }

        if let Ok(mut times) = self.batch_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Count of rows with the given outcome
    pub fn rows_with_status(&self, status: FraudStatus) -> u64 {
        self.rows_by_status
            .read()
            .map(|m| m.get(&status).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get batch processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let sorted = match self.batch_times.read() {
            Ok(times) if !times.is_empty() => {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                sorted
            }
            _ => return ProcessingStats::default(),
        };

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Rows classified per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_classified.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let accepted = self.uploads_accepted.load(Ordering::Relaxed);
        let rejected = self.uploads_rejected.load(Ordering::Relaxed);
        let rows = self.rows_classified.load(Ordering::Relaxed);
        let fallbacks = self.fallback_encodings.load(Ordering::Relaxed);
        let fraudulent = self.rows_with_status(FraudStatus::Fraudulent);
        let failed = self.rows_with_status(FraudStatus::PredictionFailed);
        let fraud_rate = if rows > 0 {
            (fraudulent as f64 / rows as f64) * 100.0
        } else {
            0.0
        };
        let processing = self.get_processing_stats();

        info!(
            uploads_accepted = accepted,
            uploads_rejected = rejected,
            rows_classified = rows,
            fraudulent = fraudulent,
            prediction_failed = failed,
            fallback_encodings = fallbacks,
            fraud_rate = %format!("{:.1}%", fraud_rate),
            throughput = %format!("{:.1} rows/s", self.get_throughput()),
            batch_mean_us = processing.mean_us,
            batch_p95_us = processing.p95_us,
            batch_p99_us = processing.p99_us,
            "Intake metrics summary"
        );
    }
}

impl Default for IntakeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: std::sync::Arc<IntakeMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<IntakeMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
