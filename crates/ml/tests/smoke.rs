//! Smoke test: write real artifacts to disk, load them through the config
//! path and price a few flats end to end with the local model.

use std::path::Path;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};

use hdb_core::config::{
    AppConfig, ArtifactConfig, BackendKind, EncodingConfig, LoggingConfig, PredictorConfig,
    RemoteConfig,
};
use hdb_ml::model::PriceRegressor;
use hdb_ml::scaler::{Scaler, ScalerParams};
use hdb_ml::schema::{FeatureSchema, NUM_FEATURES};
use hdb_ml::{
    ConfigurationError, FloorArea, PipelineError, PricePipeline, RawPropertyInput, ValidationError,
};

const POSTAL_DATA: &str = r#"{
    "760123": [{"town": "YISHUN", "lease_commence_date": "1986", "block": "123"}],
    "520456": [{"town": "TAMPINES", "lease_commence_date": 1995}],
    "999999": [{"town": "", "lease_commence_date": "1990"}]
}"#;

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        artifacts: ArtifactConfig {
            scaler_path: dir.join("scaler.json"),
            postal_data_path: dir.join("postal_data.json"),
        },
        predictor: PredictorConfig {
            backend: BackendKind::Local,
            model_path: dir.join("model.safetensors"),
            remote: RemoteConfig {
                base_url: String::new(),
                model_name: "hdb-resale".into(),
                input_name: "input-0".into(),
                host_header: None,
                timeout_ms: 30_000,
                auth_token: None,
            },
        },
        encoding: EncodingConfig::default(),
        logging: LoggingConfig::default(),
    }
}

fn write_model(dir: &Path, in_features: usize) {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    PriceRegressor::new(vb, in_features, &[32, 8]).unwrap();
    varmap.save(dir.join("model.safetensors")).unwrap();
}

/// Standard scaler with plausible means for the scalar columns.
fn write_scaler(dir: &Path) {
    let schema = FeatureSchema::hdb_resale();
    let mut mean = vec![0.5; NUM_FEATURES];
    let mut scale = vec![0.5; NUM_FEATURES];
    let scalars = [
        (95.0, 25.0),
        (500_000.0, 250_000.0),
        (8.0, 5.0),
        (2020.0, 3.0),
        (6.5, 3.5),
        (70.0, 15.0),
    ];
    for (i, (m, s)) in scalars.into_iter().enumerate() {
        mean[i] = m;
        scale[i] = s;
    }
    Scaler::new(
        ScalerParams::Standard { mean, scale },
        Some(schema.feature_names().to_vec()),
    )
    .unwrap()
    .save(&dir.join("scaler.json"))
    .unwrap();
}

fn write_all(dir: &Path) {
    write_model(dir, NUM_FEATURES);
    write_scaler(dir);
    std::fs::write(dir.join("postal_data.json"), POSTAL_DATA).unwrap();
}

fn flat(town: Option<&str>, postal: Option<&str>) -> RawPropertyInput {
    let mut b = RawPropertyInput::builder()
        .floor_area(FloorArea::sqft(1_000.0))
        .lease_commencement_year(2000)
        .storey_avg(8.0)
        .sale_period(2025, 9)
        .flat_type("4 ROOM")
        .flat_model("MODEL A");
    if let Some(t) = town {
        b = b.town(t);
    }
    if let Some(p) = postal {
        b = b.postal_code(p);
    }
    b.build().unwrap()
}

#[tokio::test]
async fn smoke_local_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_all(dir.path());

    let pipeline = PricePipeline::from_config(&config(dir.path()));
    pipeline.startup_check().await.unwrap();

    let by_town = pipeline
        .predict_price(&flat(Some("SENGKANG"), None))
        .await
        .unwrap();
    assert!(by_town.price.is_finite());
    assert_eq!(by_town.context.town, "SENGKANG");
    assert!((by_town.context.floor_area_sqm - 92.903).abs() < 1e-3);
    assert!((by_town.context.floor_area_sqft - 1_000.0).abs() < 1e-6);
    assert_eq!(by_town.context.remaining_lease_years, 74.0);

    let by_postal = pipeline
        .predict_price(&flat(None, Some("760123")))
        .await
        .unwrap();
    assert_eq!(by_postal.context.town, "YISHUN");
    assert_eq!(by_postal.context.lease_commencement_year, 1986);

    let numeric_year = pipeline
        .predict_price(&flat(None, Some("520456")))
        .await
        .unwrap();
    assert_eq!(numeric_year.context.lease_commencement_year, 1995);
}

#[tokio::test]
async fn smoke_repeat_requests_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_all(dir.path());
    let pipeline = PricePipeline::from_config(&config(dir.path()));

    let input = flat(Some("BEDOK"), None);
    let first = pipeline.predict_price(&input).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            let input = input.clone();
            tokio::spawn(async move { pipeline.predict_price(&input).await.unwrap() })
        })
        .collect();
    for h in handles {
        assert_eq!(h.await.unwrap(), first);
    }
}

#[tokio::test]
async fn smoke_request_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_all(dir.path());
    let pipeline = PricePipeline::from_config(&config(dir.path()));

    let err = pipeline
        .predict_price(&flat(None, Some("000000")))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::Validation(ValidationError::PostalCodeNotFound("000000".into()))
    );
    assert!(!err.is_fatal());

    let err = pipeline
        .predict_price(&flat(None, Some("999999")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::MalformedLocationRecord { .. })
    ));

    let err = pipeline
        .predict_price(&flat(Some("GOTHAM"), None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::UnknownCategoryValue {
            group: "town",
            ..
        })
    ));
}

#[tokio::test]
async fn smoke_without_postal_data_town_mode_still_works() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), NUM_FEATURES);
    write_scaler(dir.path());
    let pipeline = PricePipeline::from_config(&config(dir.path()));
    pipeline.startup_check().await.unwrap();

    let by_town = pipeline.predict_price(&flat(Some("BEDOK"), None)).await;
    assert!(by_town.is_ok());
    let err = pipeline
        .predict_price(&flat(None, Some("760123")))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::Validation(ValidationError::LocationDataUnavailable)
    );
}

#[tokio::test]
async fn smoke_model_width_drift_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_all(dir.path());
    write_model(dir.path(), NUM_FEATURES + 1);

    let pipeline = PricePipeline::from_config(&config(dir.path()));
    let err = pipeline.startup_check().await.unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::SchemaMismatch {
            component: "model",
            expected: NUM_FEATURES,
            actual: NUM_FEATURES + 1,
        }
    );
}

#[tokio::test]
async fn smoke_model_width_drift_fails_requests_without_startup_check() {
    let dir = tempfile::tempdir().unwrap();
    write_all(dir.path());
    write_model(dir.path(), NUM_FEATURES + 1);

    let pipeline = PricePipeline::from_config(&config(dir.path()));
    for input in [flat(Some("BEDOK"), None), flat(None, Some("760123"))] {
        let err = pipeline.predict_price(&input).await.unwrap_err();
        assert!(err.is_fatal(), "{err:?}");
        assert_eq!(
            err,
            PipelineError::Configuration(ConfigurationError::SchemaMismatch {
                component: "model",
                expected: NUM_FEATURES,
                actual: NUM_FEATURES + 1,
            })
        );
    }
}

#[tokio::test]
async fn smoke_missing_scaler_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_model(dir.path(), NUM_FEATURES);

    let pipeline = PricePipeline::from_config(&config(dir.path()));
    let err = pipeline
        .predict_price(&flat(Some("BEDOK"), None))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::ArtifactUnavailable {
            artifact: "scaler",
            ..
        })
    ));
}
