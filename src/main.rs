//! Invoice Fraud Intake - Main Entry Point
//!
//! Loads the classifier artifacts once, opens the invoice store and serves
//! the upload and lookup endpoints.

use anyhow::{Context, Result};
use invoice_fraud_intake::{
    config::{AppConfig, LoggingConfig},
    metrics::{IntakeMetrics, MetricsReporter},
    models::{inference::ClaimClassifier, loader::ArtifactLoader},
    producer::AlertProducer,
    server,
    storage::SqliteInvoiceStore,
    IntakeService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive(format!("invoice_fraud_intake={}", logging.level).parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Invoice Fraud Intake");
    info!(
        "High-claim quantile: {:.2}, suspicious diagnoses: {:?}, fallback diagnosis: {}",
        config.detection.high_claim_quantile,
        config.detection.suspicious_diagnoses,
        config.detection.fallback_diagnosis
    );

    // Load encoder, scaler and model together; any mismatch aborts startup
    let loader = ArtifactLoader::with_threads(config.models.onnx_threads)?;
    let artifacts = loader.load_artifacts(&config.models, &config.detection)?;
    info!(
        model = artifacts.model_name(),
        version = artifacts.version(),
        "Classifier ready"
    );
    let classifier = ClaimClassifier::new(Arc::new(artifacts));

    let store = SqliteInvoiceStore::new(&config.storage.database_path).with_context(|| {
        format!(
            "Failed to open invoice store {}",
            config.storage.database_path.display()
        )
    })?;
    info!(path = %config.storage.database_path.display(), "Invoice store opened");

    let metrics = Arc::new(IntakeMetrics::new());
    let mut service =
        IntakeService::from_config(&config, classifier, Arc::new(store)).with_metrics(metrics.clone());

    if config.alerts.enabled {
        match AlertProducer::connect(&config.alerts.nats_url, &config.alerts.subject).await {
            Ok(producer) => {
                info!("Publishing fraud alerts to: {}", producer.subject());
                service = service.with_alerts(producer);
            }
            Err(e) => warn!(error = %e, "Fraud alerts disabled"),
        }
    }

    // Start metrics reporter (logs a summary every 60 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 60);
        reporter.start().await;
    });

    let app = server::router(Arc::new(service), config.server.max_upload_bytes);
    let bind_addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("Server error")?;

    // Print final summary
    info!("Intake service shutting down...");
    metrics.print_summary();

    Ok(())
}
