//! Remote tensor-inference client.
//!
//! Speaks the v2 inference protocol (`POST /v2/models/{model}/infer`) used by
//! KServe, Triton and similar servers. One request carries a single `[1, N]`
//! FP32 tensor; the price is the first value of the first output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use hdb_core::config::RemoteConfig;

use crate::error::{ConfigurationError, InvocationError};
use crate::features::ScaledVector;
use crate::predictor::Predictor;

/// Inference request body.
#[derive(Debug, Serialize)]
pub struct InferRequest<'a> {
    pub inputs: Vec<InferInput<'a>>,
}

/// One named input tensor, data flattened row-major.
#[derive(Debug, Serialize)]
pub struct InferInput<'a> {
    pub name: &'a str,
    pub shape: [usize; 2],
    pub datatype: &'static str,
    pub data: &'a [f32],
}

/// Inference response body; only `outputs[*].data` is read.
#[derive(Debug, Deserialize)]
pub struct InferResponse {
    #[serde(default)]
    pub outputs: Vec<InferOutput>,
}

#[derive(Debug, Deserialize)]
pub struct InferOutput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Vec<f64>,
}

/// Error body returned by the server on non-success statuses.
#[derive(Debug, Deserialize)]
struct InferErrorBody {
    error: String,
}

/// Absolute `http(s)` URL of the model's infer route under `base_url`.
fn infer_url(base_url: &str, model_name: &str) -> Result<String, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidArtifact {
        artifact: "inference endpoint",
        reason,
    };
    let base = reqwest::Url::parse(base_url)
        .map_err(|e| invalid(format!("base_url {base_url:?}: {e}")))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("base_url {base_url:?}: scheme must be http or https")));
    }
    if base.host_str().map_or(true, str::is_empty) {
        return Err(invalid(format!("base_url {base_url:?}: missing host")));
    }
    if model_name.is_empty() || model_name.contains(|c: char| c.is_whitespace() || c == '/') {
        return Err(invalid(format!("model_name {model_name:?} is not a path segment")));
    }
    Ok(format!(
        "{}/v2/models/{}/infer",
        base.as_str().trim_end_matches('/'),
        model_name
    ))
}

/// Predictor backed by a remote inference server.
///
/// Reuses one `reqwest::Client` for connection pooling; every request is
/// bounded by the configured timeout.
pub struct RemotePredictor {
    infer_url: String,
    input_name: String,
    host_header: Option<String>,
    auth_token: Option<String>,
    timeout_ms: u64,
    client: Client,
}

impl RemotePredictor {
    pub fn new(cfg: &RemoteConfig) -> Result<Self, ConfigurationError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| ConfigurationError::InvalidArtifact {
                artifact: "inference endpoint",
                reason: e.to_string(),
            })?;

        let infer_url = infer_url(&cfg.base_url, &cfg.model_name)?;
        tracing::info!(
            url = %infer_url,
            timeout_ms = cfg.timeout_ms,
            "remote predictor configured"
        );

        Ok(Self {
            infer_url,
            input_name: cfg.input_name.clone(),
            host_header: cfg.host_header.clone(),
            auth_token: cfg.auth_token.clone(),
            timeout_ms: cfg.timeout_ms,
            client,
        })
    }

    pub fn infer_url(&self) -> &str {
        &self.infer_url
    }

    fn classify(&self, err: reqwest::Error) -> InvocationError {
        if err.is_timeout() {
            InvocationError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else if err.is_connect() || err.is_request() {
            InvocationError::BackendUnavailable(err.to_string())
        } else {
            InvocationError::BackendError(err.to_string())
        }
    }
}

#[async_trait]
impl Predictor for RemotePredictor {
    fn name(&self) -> &str {
        "remote"
    }

    fn expected_features(&self) -> Option<usize> {
        None
    }

    async fn predict(&self, features: &ScaledVector) -> Result<f64, InvocationError> {
        let body = InferRequest {
            inputs: vec![InferInput {
                name: &self.input_name,
                shape: [1, features.len()],
                datatype: "FP32",
                data: features.as_slice(),
            }],
        };

        let mut req = self.client.post(&self.infer_url).json(&body);
        if let Some(host) = &self.host_header {
            req = req.header(reqwest::header::HOST, host);
        }
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<InferErrorBody>(&text) {
                return Err(InvocationError::BackendError(format!("HTTP {status}: {}", err.error)));
            }
            return Err(InvocationError::BackendError(format!("HTTP {status}: {text}")));
        }

        parse_prediction(&text)
    }
}

/// Extract the price from a successful response body.
pub fn parse_prediction(body: &str) -> Result<f64, InvocationError> {
    let resp: InferResponse = serde_json::from_str(body)
        .map_err(|e| InvocationError::BackendError(format!("malformed response: {e}")))?;
    let output = resp
        .outputs
        .first()
        .ok_or_else(|| InvocationError::BackendError("response has no outputs".to_string()))?;
    let price = output.data.first().copied().ok_or_else(|| {
        InvocationError::BackendError(format!(
            "output {} has no data",
            output.name.as_deref().unwrap_or("#0")
        ))
    })?;
    if !price.is_finite() {
        return Err(InvocationError::BackendError(format!("non-finite prediction {price}")));
    }
    Ok(price)
}
