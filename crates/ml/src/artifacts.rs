//! Process-wide artifact holders.
//!
//! Each artifact is loaded on first access and memoised in a
//! [`tokio::sync::OnceCell`]; concurrent first callers wait on the same load,
//! so a file is read at most once per cache. Failed loads are not memoised
//! and are reported as [`ConfigurationError`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use hdb_core::config::{AppConfig, BackendKind, PredictorConfig};

use crate::error::ConfigurationError;
use crate::location::PostalLookupTable;
use crate::predictor::{LocalPredictor, Predictor};
use crate::remote::RemotePredictor;
use crate::scaler::Scaler;

/// Where the artifacts come from.
#[derive(Debug, Clone)]
struct ArtifactSources {
    scaler_path: PathBuf,
    postal_data_path: PathBuf,
    predictor: PredictorConfig,
}

/// Lazily loaded scaler, predictor and postal lookup table.
///
/// Passed to the pipeline explicitly; share it behind an `Arc` between
/// pipelines that should reuse the same loads.
pub struct ArtifactCache {
    sources: Option<ArtifactSources>,
    scaler: OnceCell<Arc<Scaler>>,
    predictor: OnceCell<Arc<dyn Predictor>>,
    postal: OnceCell<Arc<PostalLookupTable>>,
}

impl ArtifactCache {
    /// Cache that loads from the configured paths and backend.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            sources: Some(ArtifactSources {
                scaler_path: cfg.artifacts.scaler_path.clone(),
                postal_data_path: cfg.artifacts.postal_data_path.clone(),
                predictor: cfg.predictor.clone(),
            }),
            scaler: OnceCell::new(),
            predictor: OnceCell::new(),
            postal: OnceCell::new(),
        }
    }

    /// Cache with every artifact already in memory. Nothing is read from disk.
    pub fn preloaded(
        scaler: Scaler,
        predictor: Arc<dyn Predictor>,
        postal: PostalLookupTable,
    ) -> Self {
        Self {
            sources: None,
            scaler: OnceCell::new_with(Some(Arc::new(scaler))),
            predictor: OnceCell::new_with(Some(predictor)),
            postal: OnceCell::new_with(Some(Arc::new(postal))),
        }
    }

    /// Replace the scaler source with an in-memory value.
    pub fn with_scaler(mut self, scaler: Scaler) -> Self {
        self.scaler = OnceCell::new_with(Some(Arc::new(scaler)));
        self
    }

    /// Replace the predictor source with an in-memory backend.
    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = OnceCell::new_with(Some(predictor));
        self
    }

    /// Replace the postal data source with an in-memory table.
    pub fn with_postal_table(mut self, table: PostalLookupTable) -> Self {
        self.postal = OnceCell::new_with(Some(Arc::new(table)));
        self
    }

    fn sources(&self, artifact: &'static str) -> Result<&ArtifactSources, ConfigurationError> {
        self.sources
            .as_ref()
            .ok_or_else(|| ConfigurationError::ArtifactUnavailable {
                artifact,
                path: PathBuf::new(),
                reason: "no source configured".to_string(),
            })
    }

    /// The fitted scaler.
    pub async fn scaler(&self) -> Result<Arc<Scaler>, ConfigurationError> {
        self.scaler
            .get_or_try_init(|| async {
                let path = &self.sources("scaler")?.scaler_path;
                tracing::info!(?path, "loading scaler");
                let scaler = Scaler::load(path)?;
                tracing::info!(dim = scaler.dim(), "scaler ready");
                Ok::<_, ConfigurationError>(Arc::new(scaler))
            })
            .await
            .cloned()
    }

    /// The configured prediction backend.
    pub async fn predictor(&self) -> Result<Arc<dyn Predictor>, ConfigurationError> {
        self.predictor
            .get_or_try_init(|| async {
                let cfg = &self.sources("predictor")?.predictor;
                let predictor: Arc<dyn Predictor> = match cfg.backend {
                    BackendKind::Local => Arc::new(LocalPredictor::load(&cfg.model_path)?),
                    BackendKind::Remote => Arc::new(RemotePredictor::new(&cfg.remote)?),
                };
                Ok::<_, ConfigurationError>(predictor)
            })
            .await
            .cloned()
    }

    /// The postal lookup table.
    ///
    /// A missing or unreadable file degrades to an empty table so town-based
    /// requests keep working; a file that exists but does not parse is fatal.
    pub async fn postal_table(&self) -> Result<Arc<PostalLookupTable>, ConfigurationError> {
        self.postal
            .get_or_try_init(|| async {
                let path = &self.sources("postal lookup table")?.postal_data_path;
                let table = match PostalLookupTable::load(path) {
                    Ok(table) => {
                        tracing::info!(?path, entries = table.len(), "postal lookup table ready");
                        table
                    }
                    Err(e @ ConfigurationError::ArtifactUnavailable { .. }) => {
                        tracing::warn!(
                            error = %e,
                            "postal lookup data unavailable, postal codes cannot be resolved"
                        );
                        PostalLookupTable::empty()
                    }
                    Err(e) => return Err(e),
                };
                Ok::<_, ConfigurationError>(Arc::new(table))
            })
            .await
            .cloned()
    }
}
