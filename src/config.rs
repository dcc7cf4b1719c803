//! Configuration management for the invoice intake service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "INTAKE_CONFIG";

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single upload request body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind, e.g. `0.0.0.0:8000`
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory where raw uploads are kept
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("invoices.db"),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory containing the manifest and ONNX model
    pub artifacts_dir: PathBuf,
    /// Manifest file name inside `artifacts_dir`
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_manifest() -> String {
    "artifacts.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("models"),
            manifest: default_manifest(),
            onnx_threads: default_onnx_threads(),
        }
    }
}

impl ModelsConfig {
    /// Full path of the artifact manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.manifest)
    }
}

/// Feature derivation and classification constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Quantile of the batch claim amounts above which a claim is "high"
    #[serde(default = "default_high_claim_quantile")]
    pub high_claim_quantile: f64,
    /// Diagnoses flagged as suspicious
    #[serde(default = "default_suspicious_diagnoses")]
    pub suspicious_diagnoses: Vec<String>,
    /// Known diagnosis substituted for ones outside the training vocabulary
    #[serde(default = "default_fallback_diagnosis")]
    pub fallback_diagnosis: String,
}

fn default_high_claim_quantile() -> f64 {
    0.95
}

fn default_suspicious_diagnoses() -> Vec<String> {
    vec!["Surgery".to_string(), "Cancer Treatment".to_string()]
}

fn default_fallback_diagnosis() -> String {
    "Flu".to_string()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            high_claim_quantile: default_high_claim_quantile(),
            suspicious_diagnoses: default_suspicious_diagnoses(),
            fallback_diagnosis: default_fallback_diagnosis(),
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on deriving and classifying one batch, in milliseconds
    pub timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Fraud alert publication
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub enabled: bool,
    /// NATS server URL
    pub nats_url: String,
    /// Subject for outgoing fraud alerts
    pub subject: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nats_url: "nats://localhost:4222".to_string(),
            subject: "invoices.fraud".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `INTAKE_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `INTAKE__*` env overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("INTAKE")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let q = self.detection.high_claim_quantile;
        if !(0.0..=1.0).contains(&q) {
            anyhow::bail!("detection.high_claim_quantile must be within [0, 1], got {q}");
        }
        if self.detection.fallback_diagnosis.trim().is_empty() {
            anyhow::bail!("detection.fallback_diagnosis must not be empty");
        }
        if self.pipeline.timeout_ms == 0 {
            anyhow::bail!("pipeline.timeout_ms must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.detection.high_claim_quantile, 0.95);
        assert_eq!(config.detection.fallback_diagnosis, "Flu");
        assert_eq!(
            config.detection.suspicious_diagnoses,
            vec!["Surgery", "Cancer Treatment"]
        );
        assert!(!config.alerts.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"\nport = 9100").unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.models.manifest, "artifacts.json");
        assert_eq!(config.pipeline.timeout_ms, 30_000);
    }

    #[test]
    fn test_partial_section_keeps_other_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[alerts]\nenabled = true\n\n[logging]\nformat = \"json\"").unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert!(config.alerts.enabled);
        assert_eq!(config.alerts.nats_url, "nats://localhost:4222");
        assert_eq!(config.alerts.subject, "invoices.fraud");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = AppConfig::environment().source(Some(
            [
                ("INTAKE__SERVER__PORT".to_string(), "9000".to_string()),
                ("INTAKE__PIPELINE__TIMEOUT_MS".to_string(), "500".to_string()),
            ]
            .into_iter()
            .collect(),
        ));

        let config = AppConfig::load_with_env(dir.path().join("absent.toml"), env).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pipeline.timeout_ms, 500);
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn test_rejects_out_of_range_quantile() {
        let mut config = AppConfig::default();
        config.detection.high_claim_quantile = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_manifest_path() {
        let config = AppConfig::default();
        assert_eq!(
            config.models.manifest_path(),
            PathBuf::from("models/artifacts.json")
        );
    }
}
