//! Prediction backends and the inference invoker.
//!
//! [`Predictor`] is the single capability the pipeline depends on; the
//! configured backend decides whether it is a [`LocalPredictor`] (candle
//! model in-process) or a [`RemotePredictor`](crate::remote::RemotePredictor).
//!
//! [`invoke`] runs one request through `Built → Sent → Succeeded | Failed`
//! and never retries.

use std::path::Path;

use async_trait::async_trait;
use candle_core::Device;
use serde::Serialize;

use crate::error::{ConfigurationError, InvocationError};
use crate::features::ScaledVector;
use crate::model::PriceRegressor;

/// Compute a price from a scaled feature vector.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Input width the backend reports, if it can report one.
    fn expected_features(&self) -> Option<usize>;

    async fn predict(&self, features: &ScaledVector) -> Result<f64, InvocationError>;
}

/// Wraps the in-process regressor. No I/O after load.
pub struct LocalPredictor {
    model: PriceRegressor,
}

impl LocalPredictor {
    /// Load weights from a safetensors file on the CPU.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            return Err(ConfigurationError::ArtifactUnavailable {
                artifact: "model",
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        tracing::info!(?path, "loading local price model");
        let model = PriceRegressor::load(path, &Device::Cpu)
            .map_err(|e| ConfigurationError::InvalidArtifact {
                artifact: "model",
                reason: format!("{e:#}"),
            })?;
        tracing::info!(in_features = model.in_features(), "local price model ready");
        Ok(Self { model })
    }

    /// Create from an already-built model.
    pub fn from_model(model: PriceRegressor) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Predictor for LocalPredictor {
    fn name(&self) -> &str {
        "local"
    }

    fn expected_features(&self) -> Option<usize> {
        Some(self.model.in_features())
    }

    async fn predict(&self, features: &ScaledVector) -> Result<f64, InvocationError> {
        let price = self
            .model
            .predict_one(features.as_slice())
            .map_err(|e| InvocationError::LocalModelError(format!("{e:#}")))?;
        if !price.is_finite() {
            return Err(InvocationError::LocalModelError(format!("non-finite prediction {price}")));
        }
        Ok(f64::from(price))
    }
}

/// A price and the context it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub price: f64,
    #[serde(flatten)]
    pub context: PredictionContext,
}

/// What the caller needs to display alongside the price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionContext {
    pub town: String,
    pub postal_code: Option<String>,
    pub flat_type: String,
    pub flat_model: String,
    pub sale_year: i32,
    pub sale_month: u32,
    pub floor_area_sqm: f64,
    /// Same area in square feet, using the configured conversion factor.
    pub floor_area_sqft: f64,
    pub storey_avg: f64,
    pub lease_commencement_year: i32,
    pub remaining_lease_years: f64,
}

/// Send a scaled vector to the backend and wrap the price.
pub async fn invoke(
    predictor: &dyn Predictor,
    features: &ScaledVector,
    context: PredictionContext,
) -> Result<PredictionResult, InvocationError> {
    tracing::debug!(
        backend = predictor.name(),
        width = features.len(),
        "inference request sent"
    );

    let outcome = predictor.predict(features).await;

    match outcome {
        Ok(price) => {
            tracing::debug!(backend = predictor.name(), price, "inference succeeded");
            Ok(PredictionResult { price, context })
        }
        Err(e) => {
            tracing::warn!(backend = predictor.name(), error = %e, "inference failed");
            Err(e)
        }
    }
}
