//! Layered configuration for the HDB resale price predictor.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (local model, artifact files in the working directory)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `HDB_`, nested with `__`)
//! 4. `HDB_INFERENCE_TOKEN` for the remote backend's bearer token
//!
//! The bearer token **must** come from the environment, never from a
//! configuration file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

// ── Default value functions ────────────────────────────────────────────

/// Default remote inference timeout: 30 000 ms.
fn default_timeout_ms() -> u64 {
    30_000
}

/// Default tensor input name expected by the inference server.
fn default_input_name() -> String {
    "input-0".to_string()
}

/// Default square feet per square metre.
fn default_sqft_per_sqm() -> f64 {
    10.7639
}

/// Default leasehold term: 99 years.
fn default_lease_term_years() -> f64 {
    99.0
}

/// Default floor for the derived remaining lease: 10 years.
fn default_min_remaining_lease_years() -> f64 {
    10.0
}

/// Default ceiling for the derived remaining lease: 99 years.
fn default_max_remaining_lease_years() -> f64 {
    99.0
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Scaler and postal lookup locations.
    pub artifacts: ArtifactConfig,
    /// Prediction backend selection.
    pub predictor: PredictorConfig,
    /// Feature encoding policy constants.
    #[serde(default)]
    pub encoding: EncodingConfig,
    /// Log output format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Locations of the artifacts loaded once per process.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Fitted scaler parameters (JSON).
    pub scaler_path: PathBuf,
    /// Postal code lookup dataset (JSON).
    pub postal_data_path: PathBuf,
}

/// Which prediction backend to use and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    /// `local` for the in-process model, `remote` for an inference server.
    pub backend: BackendKind,
    /// Model weights for the local backend (safetensors).
    pub model_path: PathBuf,
    /// Remote inference server settings.
    pub remote: RemoteConfig,
}

/// Prediction backend selector.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Model evaluated in-process.
    Local,
    /// Model served by a tensor inference endpoint.
    Remote,
}

/// Remote inference endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the inference server, e.g. `http://kserve.local`.
    #[serde(default)]
    pub base_url: String,
    /// Model name used in the `/v2/models/{name}/infer` route.
    pub model_name: String,
    /// Name of the input tensor.
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// Optional `Host` header for virtual-host routing behind an ingress.
    #[serde(default)]
    pub host_header: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bearer token, read from `HDB_INFERENCE_TOKEN` only.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Domain constants used while encoding features.
///
/// These encode the 99-year leasehold regime and the area unit the model was
/// trained on; they are configurable so a policy change does not need a
/// rebuild.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EncodingConfig {
    /// Square feet in one square metre.
    #[serde(default = "default_sqft_per_sqm")]
    pub sqft_per_sqm: f64,
    /// Length of a fresh lease, in years.
    #[serde(default = "default_lease_term_years")]
    pub lease_term_years: f64,
    /// Lower clamp bound for the remaining lease.
    #[serde(default = "default_min_remaining_lease_years")]
    pub min_remaining_lease_years: f64,
    /// Upper clamp bound for the remaining lease.
    #[serde(default = "default_max_remaining_lease_years")]
    pub max_remaining_lease_years: f64,
}

/// Log output settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of pretty output.
    #[serde(default)]
    pub json: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            sqft_per_sqm: default_sqft_per_sqm(),
            lease_term_years: default_lease_term_years(),
            min_remaining_lease_years: default_min_remaining_lease_years(),
            max_remaining_lease_years: default_max_remaining_lease_years(),
        }
    }
}

impl EncodingConfig {
    /// Check that the constants are usable: a positive conversion factor and
    /// ordered, finite clamp bounds within the lease term.
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.sqft_per_sqm,
            self.lease_term_years,
            self.min_remaining_lease_years,
            self.max_remaining_lease_years,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            bail!("encoding constants must be finite");
        }
        if self.sqft_per_sqm <= 0.0 {
            bail!(
                "encoding.sqft_per_sqm must be positive, got {}",
                self.sqft_per_sqm
            );
        }
        if self.min_remaining_lease_years < 0.0
            || self.min_remaining_lease_years > self.max_remaining_lease_years
            || self.max_remaining_lease_years > self.lease_term_years
        {
            bail!(
                "remaining lease bounds must satisfy 0 <= min ({}) <= max ({}) <= term ({})",
                self.min_remaining_lease_years,
                self.max_remaining_lease_years,
                self.lease_term_years
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `HDB_` and `__` as the
    ///    nesting separator (e.g., `HDB_PREDICTOR__BACKEND=remote`).
    /// 4. `HDB_INFERENCE_TOKEN` for the remote bearer token.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            .set_default("artifacts.scaler_path", "scaler.json")?
            .set_default("artifacts.postal_data_path", "postal_data.json")?
            .set_default("predictor.backend", "local")?
            .set_default("predictor.model_path", "model.safetensors")?
            .set_default("predictor.remote.base_url", "")?
            .set_default("predictor.remote.model_name", "hdb-resale")?
            .set_default("predictor.remote.input_name", "input-0")?
            .set_default("predictor.remote.timeout_ms", 30_000i64)?
            .set_default("encoding.sqft_per_sqm", 10.7639)?
            .set_default("encoding.lease_term_years", 99.0)?
            .set_default("encoding.min_remaining_lease_years", 10.0)?
            .set_default("encoding.max_remaining_lease_years", 99.0)?
            .set_default("logging.json", false)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path.to_str().context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (HDB_ prefix) ──────────────
        // The prefix separator is set explicitly; otherwise `config` would
        // reuse `__` and expect `HDB__PREDICTOR__BACKEND`.
        builder = builder.add_source(
            Environment::with_prefix("HDB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        // ── Layer 4: bearer token ─────────────────────────────────
        cfg.predictor.remote.auth_token = std::env::var("HDB_INFERENCE_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration invariants.
    fn validate(&self) -> Result<()> {
        if self.predictor.backend == BackendKind::Remote {
            if self.predictor.remote.base_url.trim().is_empty() {
                bail!("predictor.remote.base_url is required for the remote backend");
            }
            if self.predictor.remote.model_name.trim().is_empty() {
                bail!("predictor.remote.model_name is required for the remote backend");
            }
        }
        if self.predictor.remote.timeout_ms == 0 {
            bail!("predictor.remote.timeout_ms must be greater than zero");
        }
        self.encoding.validate()
    }
}
