//! Error taxonomy for the pricing pipeline.
//!
//! Three families, each passed upward intact to [`PipelineError`]:
//! - [`ConfigurationError`]: fatal, raised at startup (or on first artifact
//!   access) and never degraded into a default.
//! - [`ValidationError`]: the request is rejected; nothing was sent to the
//!   backend.
//! - [`InvocationError`]: the backend call failed; no partial price exists.

use std::path::PathBuf;

/// Fatal misconfiguration: missing artifacts or dimensionality drift.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// The artifact file is missing or unreadable.
    #[error("{artifact} unavailable at {}: {reason}", path.display())]
    ArtifactUnavailable {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },
    /// The artifact was read but its contents are unusable.
    #[error("invalid {artifact}: {reason}")]
    InvalidArtifact {
        artifact: &'static str,
        reason: String,
    },
    /// A component disagrees with the feature schema on the vector width.
    #[error("schema mismatch: {component} expects {actual} features, schema has {expected}")]
    SchemaMismatch {
        component: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The feature name list itself is malformed.
    #[error("invalid feature schema: {0}")]
    InvalidSchema(String),
}

/// The request cannot be encoded as given.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("postal code {0:?} is not a 6-digit code")]
    InvalidPostalCodeFormat(String),
    #[error("postal code data is not loaded")]
    LocationDataUnavailable,
    #[error("postal code {0} not found")]
    PostalCodeNotFound(String),
    #[error("location record for postal code {code} is malformed: {reason}")]
    MalformedLocationRecord { code: String, reason: String },
    /// A categorical value outside the group's registered members.
    #[error("unknown {group} value {value:?}")]
    UnknownCategoryValue { group: &'static str, value: String },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// The prediction backend did not produce a price.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvocationError {
    /// Connection refused, DNS failure, or the host is unreachable.
    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("inference backend did not respond within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Non-success status, or a response without a usable prediction.
    #[error("inference backend error: {0}")]
    BackendError(String),
    #[error("local model failed: {0}")]
    LocalModelError(String),
}

/// Every failure the pipeline entry point can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

impl PipelineError {
    /// Configuration errors are fatal for the process, the rest only for the
    /// request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Configuration(_))
    }
}
