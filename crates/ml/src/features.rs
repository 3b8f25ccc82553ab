//! Encoding of a property request into the model's input vector.
//!
//! [`FeatureEncoder::encode`] writes every scalar and one-hot member by the
//! slot index precomputed in [`FeatureSchema`], so the output is always in
//! schema order with exactly `schema.len()` values. [`FeatureEncoder::build`]
//! then applies the fitted [`Scaler`].

use std::sync::Arc;

use hdb_core::config::EncodingConfig;

use crate::error::{PipelineError, ValidationError};
use crate::input::{AreaUnit, FloorArea, RawPropertyInput};
use crate::location::ResolvedLocation;
use crate::scaler::Scaler;
use crate::schema::{CategoryGroup, FeatureSchema, ScalarFeature};

/// Square feet in one square metre.
pub const SQFT_PER_SQM: f64 = 10.7639;

pub fn sqm_to_sqft(sqm: f64) -> f64 {
    sqm * SQFT_PER_SQM
}

pub fn sqft_to_sqm(sqft: f64) -> f64 {
    sqft / SQFT_PER_SQM
}

/// Unscaled model input, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Model input after the fitted scaler's transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledVector(Vec<f32>);

impl ScaledVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Domain constants applied while encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingPolicy {
    pub sqft_per_sqm: f64,
    pub lease_term_years: f64,
    pub min_remaining_lease_years: f64,
    pub max_remaining_lease_years: f64,
}

impl Default for EncodingPolicy {
    fn default() -> Self {
        Self {
            sqft_per_sqm: SQFT_PER_SQM,
            lease_term_years: 99.0,
            min_remaining_lease_years: 10.0,
            max_remaining_lease_years: 99.0,
        }
    }
}

impl From<&EncodingConfig> for EncodingPolicy {
    fn from(cfg: &EncodingConfig) -> Self {
        Self {
            sqft_per_sqm: cfg.sqft_per_sqm,
            lease_term_years: cfg.lease_term_years,
            min_remaining_lease_years: cfg.min_remaining_lease_years,
            max_remaining_lease_years: cfg.max_remaining_lease_years,
        }
    }
}

impl EncodingPolicy {
    /// Floor area in square metres, the unit the model was trained on.
    pub fn floor_area_sqm(&self, area: FloorArea) -> f64 {
        match area.unit {
            AreaUnit::SquareMeters => area.value,
            AreaUnit::SquareFeet => area.value / self.sqft_per_sqm,
        }
    }

    /// Years left on the lease at the sale date, clamped to the configured
    /// bounds. Saturates on any input, including sales before the lease
    /// started.
    pub fn remaining_lease_years(&self, sale_year: i32, lease_commencement_year: i32) -> f64 {
        let elapsed = f64::from(sale_year) - f64::from(lease_commencement_year);
        (self.lease_term_years - elapsed).clamp(
            self.min_remaining_lease_years,
            self.max_remaining_lease_years,
        )
    }
}

/// Feature vector builder bound to one schema and policy.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: Arc<FeatureSchema>,
    policy: EncodingPolicy,
}

impl FeatureEncoder {
    pub fn new(schema: Arc<FeatureSchema>, policy: EncodingPolicy) -> Self {
        Self { schema, policy }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn policy(&self) -> &EncodingPolicy {
        &self.policy
    }

    /// Encode a request into an unscaled vector.
    ///
    /// Unknown town, flat type or flat model values are rejected; a group is
    /// never left all-zero.
    pub fn encode(
        &self,
        input: &RawPropertyInput,
        location: &ResolvedLocation,
    ) -> Result<FeatureVector, ValidationError> {
        let mut values = vec![0.0_f32; self.schema.len()];

        let postal = match input.postal_code() {
            Some(code) => code
                .parse::<f64>()
                .map_err(|_| ValidationError::InvalidPostalCodeFormat(code.to_string()))?,
            None => 0.0,
        };
        let area = self.policy.floor_area_sqm(input.floor_area());
        let lease = self
            .policy
            .remaining_lease_years(input.sale_year(), location.lease_commencement_year);

        let scalars = [
            (ScalarFeature::FloorAreaSqm, area),
            (ScalarFeature::Postal, postal),
            (ScalarFeature::StoreyAvg, input.storey_avg()),
            (ScalarFeature::SaleYear, f64::from(input.sale_year())),
            (ScalarFeature::SaleMonth, f64::from(input.sale_month())),
            (ScalarFeature::RemainingLeaseYears, lease),
        ];
        for (feature, value) in scalars {
            if let Some(slot) = self.schema.scalar_slot(feature) {
                values[slot] = value as f32;
            }
        }

        let selections = [
            (CategoryGroup::Town, location.town.as_str()),
            (CategoryGroup::FlatType, input.flat_type()),
            (CategoryGroup::FlatModel, input.flat_model()),
        ];
        for (group, value) in selections {
            let slot = self.schema.category_slot(group, value).ok_or_else(|| {
                ValidationError::UnknownCategoryValue {
                    group: group.label(),
                    value: value.to_string(),
                }
            })?;
            values[slot] = 1.0;
        }

        Ok(FeatureVector(values))
    }

    /// Encode and scale.
    pub fn build(
        &self,
        input: &RawPropertyInput,
        location: &ResolvedLocation,
        scaler: &Scaler,
    ) -> Result<ScaledVector, PipelineError> {
        let features = self.encode(input, location)?;
        Ok(scaler.transform(&features)?)
    }
}
