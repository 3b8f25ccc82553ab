//! Fitted feature scaler, loaded from a JSON artifact.

use std::path::Path;

use crate::error::ConfigurationError;
use crate::features::{FeatureVector, ScaledVector};

/// Per-feature transform fitted at training time.
///
/// Stored as a JSON artifact next to the model and applied unchanged at
/// inference; it is never refit at request time. Parameter names follow the
/// fitted scikit-learn attributes so an export is a direct dump:
///
/// ```json
/// { "kind": "standard", "mean": [..], "scale": [..], "feature_names": [..] }
/// { "kind": "min_max", "min": [..], "scale": [..] }
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scaler {
    #[serde(flatten)]
    params: ScalerParams,
    /// Column order the scaler was fit on, when the export recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    /// Build and validate a scaler from its parameters.
    pub fn new(
        params: ScalerParams,
        feature_names: Option<Vec<String>>,
    ) -> Result<Self, ConfigurationError> {
        let scaler = Self {
            params,
            feature_names,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Load scaler parameters from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::ArtifactUnavailable {
                artifact: "scaler",
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let scaler: Scaler = serde_json::from_str(&data).map_err(|e| invalid(e.to_string()))?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Save scaler parameters to a JSON file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let (offset, scale) = self.vectors();
        if offset.is_empty() {
            return Err(invalid("no features"));
        }
        if offset.len() != scale.len() {
            return Err(invalid(format!(
                "parameter lengths differ: {} vs {}",
                offset.len(),
                scale.len()
            )));
        }
        if offset.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err(invalid("non-finite parameter"));
        }
        if offset
            .iter()
            .chain(scale)
            .any(|v| v.abs() > f64::from(f32::MAX))
        {
            return Err(invalid("parameter out of f32 range"));
        }
        if matches!(self.params, ScalerParams::Standard { .. })
            && scale.iter().any(|s| *s == 0.0)
        {
            return Err(invalid("zero standard scale"));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != offset.len() {
                return Err(invalid(format!(
                    "{} feature names for {} parameters",
                    names.len(),
                    offset.len()
                )));
            }
        }
        Ok(())
    }

    fn vectors(&self) -> (&[f64], &[f64]) {
        match &self.params {
            ScalerParams::Standard { mean, scale } => (mean, scale),
            ScalerParams::MinMax { min, scale } => (min, scale),
        }
    }

    /// Number of features the scaler was fit on.
    pub fn dim(&self) -> usize {
        self.vectors().0.len()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Apply the fitted transform.
    ///
    /// Fails with [`ConfigurationError::SchemaMismatch`] if the vector width
    /// differs from the fitted width, and with
    /// [`ConfigurationError::InvalidArtifact`] if any scaled value leaves the
    /// finite `f32` range.
    pub fn transform(&self, features: &FeatureVector) -> Result<ScaledVector, ConfigurationError> {
        let raw = features.as_slice();
        if raw.len() != self.dim() {
            return Err(ConfigurationError::SchemaMismatch {
                component: "scaler",
                expected: raw.len(),
                actual: self.dim(),
            });
        }

        let scaled: Vec<f32> = match &self.params {
            ScalerParams::Standard { mean, scale } => raw
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(&x, (m, s))| ((f64::from(x) - m) / s) as f32)
                .collect(),
            ScalerParams::MinMax { min, scale } => raw
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(&x, (m, s))| (f64::from(x) * s + m) as f32)
                .collect(),
        };
        if let Some(i) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(invalid(format!(
                "feature {i} scales to a non-finite value ({})",
                raw[i]
            )));
        }
        Ok(ScaledVector::new(scaled))
    }
}

fn invalid(reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidArtifact {
        artifact: "scaler",
        reason: reason.into(),
    }
}
