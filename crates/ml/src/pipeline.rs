//! Request pipeline: resolve → encode → scale → invoke.

use std::sync::Arc;

use tokio::sync::OnceCell;

use hdb_core::config::AppConfig;

use crate::artifacts::ArtifactCache;
use crate::error::{ConfigurationError, PipelineError, ValidationError};
use crate::features::{EncodingPolicy, FeatureEncoder};
use crate::input::{LocationSpec, RawPropertyInput};
use crate::location::ResolvedLocation;
use crate::predictor::{invoke, PredictionContext, PredictionResult};
use crate::schema::FeatureSchema;

/// Prices one property per call. Cheap to clone; clones share artifacts.
#[derive(Clone)]
pub struct PricePipeline {
    encoder: FeatureEncoder,
    artifacts: Arc<ArtifactCache>,
    verified: Arc<OnceCell<()>>,
}

impl PricePipeline {
    pub fn new(encoder: FeatureEncoder, artifacts: Arc<ArtifactCache>) -> Self {
        Self {
            encoder,
            artifacts,
            verified: Arc::new(OnceCell::new()),
        }
    }

    /// Pipeline over the built-in schema with artifacts from `cfg`.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let encoder = FeatureEncoder::new(
            Arc::new(FeatureSchema::hdb_resale()),
            EncodingPolicy::from(&cfg.encoding),
        );
        Self::new(encoder, Arc::new(ArtifactCache::from_config(cfg)))
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn artifacts(&self) -> &ArtifactCache {
        &self.artifacts
    }

    /// Load every artifact and check it agrees with the schema.
    ///
    /// Any error here is fatal for the process. A passing check is memoised;
    /// [`predict_price`](Self::predict_price) runs it on first use, so a
    /// caller that skips it still gets a [`ConfigurationError`] for drifted
    /// artifacts.
    pub async fn startup_check(&self) -> Result<(), ConfigurationError> {
        self.verified
            .get_or_try_init(|| self.check_artifacts())
            .await
            .map(|_| ())
    }

    async fn check_artifacts(&self) -> Result<(), ConfigurationError> {
        let schema = self.encoder.schema();

        let scaler = self.artifacts.scaler().await?;
        if scaler.dim() != schema.len() {
            return Err(ConfigurationError::SchemaMismatch {
                component: "scaler",
                expected: schema.len(),
                actual: scaler.dim(),
            });
        }
        if let Some(names) = scaler.feature_names() {
            if let Some((i, (got, want))) = names
                .iter()
                .zip(schema.feature_names())
                .enumerate()
                .find(|(_, (got, want))| got != want)
            {
                return Err(ConfigurationError::InvalidArtifact {
                    artifact: "scaler",
                    reason: format!("feature {i} is {got:?}, schema has {want:?}"),
                });
            }
        }

        let predictor = self.artifacts.predictor().await?;
        match predictor.expected_features() {
            Some(width) if width != schema.len() => {
                return Err(ConfigurationError::SchemaMismatch {
                    component: "model",
                    expected: schema.len(),
                    actual: width,
                });
            }
            Some(_) => {}
            None => tracing::info!(
                backend = predictor.name(),
                "backend does not report its input width, skipping model check"
            ),
        }

        let postal = self.artifacts.postal_table().await?;

        tracing::info!(
            features = schema.len(),
            backend = predictor.name(),
            postal_codes = postal.len(),
            "startup check passed"
        );
        Ok(())
    }

    /// Price one property.
    pub async fn predict_price(
        &self,
        input: &RawPropertyInput,
    ) -> Result<PredictionResult, PipelineError> {
        self.startup_check().await?;

        let location = match input.location() {
            LocationSpec::PostalCode(code) => self.artifacts.postal_table().await?.resolve(code)?,
            LocationSpec::Town(town) => ResolvedLocation {
                town: town.clone(),
                lease_commencement_year: input
                    .lease_commencement_year()
                    .ok_or(ValidationError::MissingField("lease_commencement_year"))?,
            },
        };

        let scaler = self.artifacts.scaler().await?;
        let scaled = self.encoder.build(input, &location, &scaler)?;
        let predictor = self.artifacts.predictor().await?;

        let policy = self.encoder.policy();
        let floor_area_sqm = policy.floor_area_sqm(input.floor_area());
        let context = PredictionContext {
            postal_code: input.postal_code().map(str::to_string),
            flat_type: input.flat_type().to_string(),
            flat_model: input.flat_model().to_string(),
            sale_year: input.sale_year(),
            sale_month: input.sale_month(),
            floor_area_sqm,
            floor_area_sqft: floor_area_sqm * policy.sqft_per_sqm,
            storey_avg: input.storey_avg(),
            remaining_lease_years: policy
                .remaining_lease_years(input.sale_year(), location.lease_commencement_year),
            lease_commencement_year: location.lease_commencement_year,
            town: location.town,
        };

        Ok(invoke(predictor.as_ref(), &scaled, context).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvocationError;
    use crate::features::ScaledVector;
    use crate::input::FloorArea;
    use crate::location::PostalLookupTable;
    use crate::predictor::Predictor;
    use crate::scaler::{Scaler, ScalerParams};
    use crate::schema::NUM_FEATURES;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the vectors it receives and returns their sum.
    #[derive(Default)]
    struct Recording {
        width: Option<usize>,
        seen: Mutex<Vec<Vec<f32>>>,
    }

    #[async_trait]
    impl Predictor for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn expected_features(&self) -> Option<usize> {
            self.width
        }

        async fn predict(&self, features: &ScaledVector) -> Result<f64, InvocationError> {
            self.seen.lock().unwrap().push(features.as_slice().to_vec());
            Ok(features.as_slice().iter().map(|&x| f64::from(x)).sum())
        }
    }

    fn identity(dim: usize) -> Scaler {
        Scaler::new(
            ScalerParams::Standard {
                mean: vec![0.0; dim],
                scale: vec![1.0; dim],
            },
            None,
        )
        .unwrap()
    }

    fn postal() -> PostalLookupTable {
        PostalLookupTable::from_json_str(
            r#"{"760123": [{"town": "YISHUN", "lease_commence_date": "1986"}]}"#,
        )
        .unwrap()
    }

    fn pipeline_with(
        scaler: Scaler,
        predictor: Arc<Recording>,
        policy: EncodingPolicy,
    ) -> PricePipeline {
        let encoder = FeatureEncoder::new(Arc::new(FeatureSchema::hdb_resale()), policy);
        let cache = ArtifactCache::preloaded(scaler, predictor, postal());
        PricePipeline::new(encoder, Arc::new(cache))
    }

    fn pipeline(scaler: Scaler, predictor: Arc<Recording>) -> PricePipeline {
        pipeline_with(scaler, predictor, EncodingPolicy::default())
    }

    fn by_town() -> RawPropertyInput {
        RawPropertyInput::builder()
            .floor_area(FloorArea::sqm(90.0))
            .lease_commencement_year(1995)
            .storey_avg(10.0)
            .sale_period(2025, 6)
            .town("TAMPINES")
            .flat_type("4 ROOM")
            .flat_model("IMPROVED")
            .build()
            .unwrap()
    }

    fn by_postal(code: &str) -> RawPropertyInput {
        RawPropertyInput::builder()
            .floor_area(FloorArea::sqm(90.0))
            .lease_commencement_year(2010)
            .storey_avg(10.0)
            .sale_period(2025, 6)
            .postal_code(code)
            .flat_type("4 ROOM")
            .flat_model("IMPROVED")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_town_request() {
        let predictor = Arc::new(Recording::default());
        let p = pipeline(identity(NUM_FEATURES), predictor.clone());
        let result = p.predict_price(&by_town()).await.unwrap();

        assert_eq!(result.context.town, "TAMPINES");
        assert_eq!(result.context.remaining_lease_years, 69.0);
        assert_eq!(result.context.postal_code, None);

        let seen = predictor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), NUM_FEATURES);
        // 90 + 0 + 10 + 2025 + 6 + 69 + three one-hots
        assert_eq!(result.price, 2203.0);
    }

    #[tokio::test]
    async fn test_postal_lookup_overrides_lease_year() {
        let p = pipeline(identity(NUM_FEATURES), Arc::new(Recording::default()));
        let result = p.predict_price(&by_postal("760123")).await.unwrap();
        assert_eq!(result.context.town, "YISHUN");
        assert_eq!(result.context.lease_commencement_year, 1986);
        assert_eq!(result.context.remaining_lease_years, 60.0);
        assert_eq!(result.context.postal_code.as_deref(), Some("760123"));
    }

    #[tokio::test]
    async fn test_context_uses_configured_area_factor() {
        let policy = EncodingPolicy {
            sqft_per_sqm: 10.0,
            ..EncodingPolicy::default()
        };
        let p = pipeline_with(
            identity(NUM_FEATURES),
            Arc::new(Recording::default()),
            policy,
        );
        let input = RawPropertyInput::builder()
            .floor_area(FloorArea::sqft(950.0))
            .lease_commencement_year(1995)
            .storey_avg(10.0)
            .sale_period(2025, 6)
            .town("TAMPINES")
            .flat_type("4 ROOM")
            .flat_model("IMPROVED")
            .build()
            .unwrap();
        let result = p.predict_price(&input).await.unwrap();
        assert_eq!(result.context.floor_area_sqm, 95.0);
        assert_eq!(result.context.floor_area_sqft, 950.0);
    }

    #[tokio::test]
    async fn test_validation_errors_never_reach_backend() {
        let predictor = Arc::new(Recording::default());
        let p = pipeline(identity(NUM_FEATURES), predictor.clone());

        let err = p.predict_price(&by_postal("000000")).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Validation(ValidationError::PostalCodeNotFound("000000".into()))
        );

        let err = p.predict_price(&by_postal("12345")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidPostalCodeFormat(_))
        ));
        assert!(predictor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_input_same_result() {
        let p = pipeline(identity(NUM_FEATURES), Arc::new(Recording::default()));
        let a = p.predict_price(&by_town()).await.unwrap();
        let b = p.predict_price(&by_town()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_startup_check_scaler_width() {
        let p = pipeline(identity(NUM_FEATURES - 1), Arc::new(Recording::default()));
        let err = p.startup_check().await.unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::SchemaMismatch {
                component: "scaler",
                expected: NUM_FEATURES,
                actual: NUM_FEATURES - 1,
            }
        );
    }

    #[tokio::test]
    async fn test_startup_check_model_width() {
        let predictor = Arc::new(Recording {
            width: Some(59),
            ..Default::default()
        });
        let p = pipeline(identity(NUM_FEATURES), predictor);
        let err = p.startup_check().await.unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::SchemaMismatch {
                component: "model",
                actual: 59,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_model_width_drift_is_fatal_on_first_request() {
        let predictor = Arc::new(Recording {
            width: Some(NUM_FEATURES + 1),
            ..Default::default()
        });
        let p = pipeline(identity(NUM_FEATURES), predictor.clone());

        let err = p.predict_price(&by_town()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(
            err,
            PipelineError::Configuration(ConfigurationError::SchemaMismatch {
                component: "model",
                expected: NUM_FEATURES,
                actual: NUM_FEATURES + 1,
            })
        );
        assert!(predictor.seen.lock().unwrap().is_empty());

        // Not memoised as passed: every request keeps failing.
        let err = p.predict_price(&by_town()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_scaler_order_drift_is_fatal_on_first_request() {
        let mut names: Vec<String> = FeatureSchema::hdb_resale().feature_names().to_vec();
        names.swap(3, 4);
        let scaler = Scaler::new(
            ScalerParams::Standard {
                mean: vec![0.0; NUM_FEATURES],
                scale: vec![1.0; NUM_FEATURES],
            },
            Some(names),
        )
        .unwrap();
        let p = pipeline(scaler, Arc::new(Recording::default()));
        let err = p.predict_price(&by_town()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigurationError::InvalidArtifact {
                artifact: "scaler",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_startup_check_scaler_names() {
        let mut names: Vec<String> = FeatureSchema::hdb_resale().feature_names().to_vec();
        names.swap(0, 2);
        let scaler = Scaler::new(
            ScalerParams::Standard {
                mean: vec![0.0; NUM_FEATURES],
                scale: vec![1.0; NUM_FEATURES],
            },
            Some(names),
        )
        .unwrap();
        let p = pipeline(scaler, Arc::new(Recording::default()));
        let err = p.startup_check().await.unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidArtifact {
                artifact: "scaler",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_startup_check_passes() {
        let predictor = Arc::new(Recording {
            width: Some(NUM_FEATURES),
            ..Default::default()
        });
        let p = pipeline(identity(NUM_FEATURES), predictor);
        p.startup_check().await.unwrap();
        p.startup_check().await.unwrap();
    }
}
