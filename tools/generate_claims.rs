//! Synthetic Claim Generator
//!
//! Writes a CSV of medical claims in the upload format, for exercising the
//! intake service by hand.
//!
//! Usage: generate_claims [OUTPUT] [COUNT] [SUSPICIOUS_RATE]

use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::info;

/// One row of the upload format
#[derive(Debug, Clone, Serialize)]
struct ClaimRecord {
    #[serde(rename = "Invoice ID")]
    invoice_id: String,
    #[serde(rename = "Patient Name")]
    patient_name: String,
    #[serde(rename = "Claim Amount")]
    claim_amount: f64,
    #[serde(rename = "Diagnosis")]
    diagnosis: String,
    #[serde(rename = "Date of Service")]
    date_of_service: String,
    #[serde(rename = "Claim Frequency")]
    claim_frequency: u32,
}

/// Claim generator for testing
struct ClaimGenerator {
    rng: rand::rngs::ThreadRng,
    claim_counter: u64,
    period_start: NaiveDate,
}

impl ClaimGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            claim_counter: 0,
            period_start: Utc::now().date_naive() - Duration::days(90),
        }
    }

    fn next_id(&mut self) -> String {
        self.claim_counter += 1;
        format!("INV-{:06}", self.claim_counter)
    }

    fn service_date(&mut self) -> String {
        let offset = self.rng.gen_range(0..90);
        (self.period_start + Duration::days(offset))
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Generate an ordinary claim
    fn generate_routine(&mut self) -> ClaimRecord {
        ClaimRecord {
            invoice_id: self.next_id(),
            patient_name: self.patient_name(),
            claim_amount: round_cents(self.rng.gen_range(80.0..1500.0)),
            diagnosis: self
                .random_choice(&["Flu", "Hypertension", "Diabetes", "Fracture", "Migraine"])
                .to_string(),
            date_of_service: self.service_date(),
            claim_frequency: self.rng.gen_range(1..3),
        }
    }

    /// Generate a claim with the traits the classifier flags
    fn generate_suspicious(&mut self) -> ClaimRecord {
        ClaimRecord {
            invoice_id: self.next_id(),
            patient_name: self.patient_name(),
            claim_amount: round_cents(self.rng.gen_range(4000.0..20000.0)), // High amount
            diagnosis: self
                .random_choice(&["Surgery", "Cancer Treatment"])
                .to_string(),
            date_of_service: self.service_date(),
            claim_frequency: self.rng.gen_range(3..10), // Repeated filings
        }
    }

    fn patient_name(&mut self) -> String {
        let first = self.random_choice(&["Alex", "Sam", "Jordan", "Taylor", "Morgan", "Riley"]);
        let last = self.random_choice(&["Smith", "Garcia", "Chen", "Okafor", "Novak", "Singh"]);
        format!("{first} {last}")
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_claims=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("claims.csv");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let suspicious_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1_f64)
        .clamp(0.0, 1.0);

    info!(
        output = %output,
        count = count,
        suspicious_rate = suspicious_rate,
        "Configuration loaded"
    );

    let mut writer = csv::Writer::from_path(output)?;
    let mut generator = ClaimGenerator::new();
    let mut rng = rand::thread_rng();

    let mut routine_count = 0;
    let mut suspicious_count = 0;

    for _ in 0..count {
        let record = if rng.gen_bool(suspicious_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            routine_count += 1;
            generator.generate_routine()
        };
        writer.serialize(&record)?;
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} claims to {} ({} routine, {} suspicious)",
        count, output, routine_count, suspicious_count
    );

    Ok(())
}
