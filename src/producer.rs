//! NATS message producer for fraud alerts

use crate::types::alert::FraudAlert;
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::{debug, info};

/// Producer for publishing fraud alerts to NATS
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
}

impl AlertProducer {
    /// Create a new alert producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Connect to NATS and create a producer for `subject`
    pub async fn connect(url: &str, subject: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {url}"))?;
        info!(url = %url, subject = %subject, "Connected to NATS for fraud alerts");
        Ok(Self::new(client, subject))
    }

    /// Publish a fraud alert
    pub async fn publish(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            alert_id = %alert.alert_id,
            invoice_id = alert.invoice_id,
            fraudulent = alert.fraudulent_rows.len(),
            "Published fraud alert"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
