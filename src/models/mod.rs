//! Claim classification components

pub mod encoder;
pub mod inference;
pub mod loader;
pub mod scaler;

pub use encoder::{DiagnosisEncoder, EncodedDiagnosis};
pub use inference::{BinaryModel, ClaimClassifier, Classification, ClassifierArtifacts};
pub use loader::{ArtifactLoader, ArtifactManifest, OnnxModel};
pub use scaler::StandardScaler;
