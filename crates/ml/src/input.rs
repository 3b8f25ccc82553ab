//! Per-request property attributes as supplied by the caller.

use chrono::Datelike;
use serde::Serialize;

use crate::error::ValidationError;

/// Accepted floor area range in square metres.
pub const FLOOR_AREA_SQM_RANGE: (f64, f64) = (20.0, 300.0);
/// Accepted floor area range in square feet.
pub const FLOOR_AREA_SQFT_RANGE: (f64, f64) = (215.0, 3230.0);
/// Highest accepted average storey.
pub const MAX_STOREY: f64 = 50.0;
/// Oldest lease commencement year on record.
pub const EARLIEST_LEASE_YEAR: i32 = 1966;

/// Unit a floor area was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareMeters,
    SquareFeet,
}

/// A floor area together with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FloorArea {
    pub value: f64,
    pub unit: AreaUnit,
}

impl FloorArea {
    pub fn sqm(value: f64) -> Self {
        Self {
            value,
            unit: AreaUnit::SquareMeters,
        }
    }

    pub fn sqft(value: f64) -> Self {
        Self {
            value,
            unit: AreaUnit::SquareFeet,
        }
    }
}

/// Where the unit is: a town picked directly, or a postal code to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSpec {
    Town(String),
    PostalCode(String),
}

/// Validated attributes for one prediction request.
///
/// Built through [`RawPropertyInput::builder`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPropertyInput {
    floor_area: FloorArea,
    lease_commencement_year: Option<i32>,
    storey_avg: f64,
    sale_year: i32,
    sale_month: u32,
    location: LocationSpec,
    flat_type: String,
    flat_model: String,
}

impl RawPropertyInput {
    pub fn builder() -> RawPropertyInputBuilder {
        RawPropertyInputBuilder::default()
    }

    pub fn floor_area(&self) -> FloorArea {
        self.floor_area
    }

    /// Caller-supplied lease start. When the location is a postal code the
    /// lookup table's year takes precedence.
    pub fn lease_commencement_year(&self) -> Option<i32> {
        self.lease_commencement_year
    }

    pub fn storey_avg(&self) -> f64 {
        self.storey_avg
    }

    pub fn sale_year(&self) -> i32 {
        self.sale_year
    }

    /// Sale month, 1–12.
    pub fn sale_month(&self) -> u32 {
        self.sale_month
    }

    pub fn location(&self) -> &LocationSpec {
        &self.location
    }

    pub fn flat_type(&self) -> &str {
        &self.flat_type
    }

    pub fn flat_model(&self) -> &str {
        &self.flat_model
    }

    /// The postal code, if the location was given as one.
    pub fn postal_code(&self) -> Option<&str> {
        match &self.location {
            LocationSpec::PostalCode(code) => Some(code),
            LocationSpec::Town(_) => None,
        }
    }
}

/// Collects optional fields and checks them in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct RawPropertyInputBuilder {
    floor_area: Option<FloorArea>,
    lease_commencement_year: Option<i32>,
    storey_avg: Option<f64>,
    sale_year: Option<i32>,
    sale_month: Option<u32>,
    location: Option<LocationSpec>,
    flat_type: Option<String>,
    flat_model: Option<String>,
}

impl RawPropertyInputBuilder {
    pub fn floor_area(mut self, area: FloorArea) -> Self {
        self.floor_area = Some(area);
        self
    }

    pub fn lease_commencement_year(mut self, year: i32) -> Self {
        self.lease_commencement_year = Some(year);
        self
    }

    pub fn storey_avg(mut self, storey: f64) -> Self {
        self.storey_avg = Some(storey);
        self
    }

    pub fn sale_period(mut self, year: i32, month: u32) -> Self {
        self.sale_year = Some(year);
        self.sale_month = Some(month);
        self
    }

    pub fn town(mut self, town: impl Into<String>) -> Self {
        self.location = Some(LocationSpec::Town(town.into()));
        self
    }

    pub fn postal_code(mut self, code: impl Into<String>) -> Self {
        self.location = Some(LocationSpec::PostalCode(code.into()));
        self
    }

    pub fn flat_type(mut self, flat_type: impl Into<String>) -> Self {
        self.flat_type = Some(flat_type.into());
        self
    }

    pub fn flat_model(mut self, flat_model: impl Into<String>) -> Self {
        self.flat_model = Some(flat_model.into());
        self
    }

    /// Check presence and ranges.
    ///
    /// Floor area must lie in [`FLOOR_AREA_SQM_RANGE`] or
    /// [`FLOOR_AREA_SQFT_RANGE`] for its unit, the storey in `1..=50` and a
    /// given lease year between [`EARLIEST_LEASE_YEAR`] and the current
    /// year. Category values and postal codes are checked later against the
    /// schema and the lookup table.
    pub fn build(self) -> Result<RawPropertyInput, ValidationError> {
        let floor_area = self.floor_area.ok_or(ValidationError::MissingField("floor_area"))?;
        let storey_avg = self.storey_avg.ok_or(ValidationError::MissingField("storey_avg"))?;
        let sale_year = self.sale_year.ok_or(ValidationError::MissingField("sale_year"))?;
        let sale_month = self.sale_month.ok_or(ValidationError::MissingField("sale_month"))?;
        let location = self.location.ok_or(ValidationError::MissingField("location"))?;
        let flat_type = self.flat_type.ok_or(ValidationError::MissingField("flat_type"))?;
        let flat_model = self.flat_model.ok_or(ValidationError::MissingField("flat_model"))?;

        if matches!(location, LocationSpec::Town(_)) && self.lease_commencement_year.is_none() {
            return Err(ValidationError::MissingField("lease_commencement_year"));
        }
        let (min_area, max_area, unit) = match floor_area.unit {
            AreaUnit::SquareMeters => (FLOOR_AREA_SQM_RANGE.0, FLOOR_AREA_SQM_RANGE.1, "sqm"),
            AreaUnit::SquareFeet => (FLOOR_AREA_SQFT_RANGE.0, FLOOR_AREA_SQFT_RANGE.1, "sqft"),
        };
        if !(min_area..=max_area).contains(&floor_area.value) {
            return Err(ValidationError::InvalidField {
                field: "floor_area",
                reason: format!(
                    "must be between {min_area} and {max_area} {unit}, got {}",
                    floor_area.value
                ),
            });
        }
        if !(1.0..=MAX_STOREY).contains(&storey_avg) {
            return Err(ValidationError::InvalidField {
                field: "storey_avg",
                reason: format!("must be between 1 and {MAX_STOREY}, got {storey_avg}"),
            });
        }
        if let Some(year) = self.lease_commencement_year {
            let latest = chrono::Local::now().year();
            if !(EARLIEST_LEASE_YEAR..=latest).contains(&year) {
                return Err(ValidationError::InvalidField {
                    field: "lease_commencement_year",
                    reason: format!(
                        "must be between {EARLIEST_LEASE_YEAR} and {latest}, got {year}"
                    ),
                });
            }
        }
        if !(1..=12).contains(&sale_month) {
            return Err(ValidationError::InvalidField {
                field: "sale_month",
                reason: format!("must be between 1 and 12, got {sale_month}"),
            });
        }

        Ok(RawPropertyInput {
            floor_area,
            lease_commencement_year: self.lease_commencement_year,
            storey_avg,
            sale_year,
            sale_month,
            location,
            flat_type,
            flat_model,
        })
    }
}
