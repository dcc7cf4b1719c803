//! Invoice Fraud Intake Library
//!
//! Accepts claim uploads (CSV or PDF), derives batch-relative claim features,
//! labels each claim with a pre-trained binary classifier and stores the
//! result for later lookup.

pub mod config;
pub mod error;
pub mod feature_deriver;
pub mod intake;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::IntakeError;
pub use feature_deriver::FeatureDeriver;
pub use intake::{ClaimPipeline, IntakeService};
pub use models::inference::ClaimClassifier;
pub use producer::AlertProducer;
pub use types::{claim::ClaimRow, invoice::FraudStatus};
