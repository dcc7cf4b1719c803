//! Per-feature standardization fit at training time

use anyhow::Result;

/// Standardizes a feature vector as `(x - mean) / scale`, feature by feature.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build a scaler from fitted statistics.
    ///
    /// A zero scale marks a constant training feature and is replaced by 1.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            anyhow::bail!(
                "Scaler mean has {} entries but scale has {}",
                mean.len(),
                scale.len()
            );
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            anyhow::bail!("Scaler statistics must be finite");
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self { mean, scale })
    }

    /// Number of features the scaler was fit on
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Scale one feature vector into model input precision.
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f32>> {
        if features.len() != self.dimension() {
            anyhow::bail!(
                "Feature vector has {} values, scaler expects {}",
                features.len(),
                self.dimension()
            );
        }

        features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .enumerate()
            .map(|(i, (&x, (&mean, &scale)))| {
                if !x.is_finite() {
                    anyhow::bail!("Feature {} is not a finite number ({})", i, x);
                }
                Ok(((x - mean) / scale) as f32)
            })
            .collect()
    }
}
