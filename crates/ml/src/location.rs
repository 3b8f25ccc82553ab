//! Postal code → (town, lease commencement year) resolution.
//!
//! The lookup dataset is a JSON object keyed by 6-digit postal code; each
//! value is a non-empty list of location records of which only the first is
//! authoritative:
//!
//! ```json
//! { "760123": [{ "town": "YISHUN", "lease_commence_date": "1986", "block": "123" }] }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ValidationError};

/// Town and lease start for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub town: String,
    pub lease_commencement_year: i32,
}

/// Lease start as stored in the dataset: exported as either text or number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LeaseYear {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LeaseYear {
    fn to_year(&self) -> Option<i32> {
        match self {
            LeaseYear::Integer(v) => i32::try_from(*v).ok(),
            LeaseYear::Float(v) if v.fract() == 0.0 && v.is_finite() => {
                i32::try_from(*v as i64).ok()
            }
            LeaseYear::Float(_) => None,
            LeaseYear::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// One row of the dataset; fields other than these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    #[serde(default)]
    pub town: String,
    #[serde(default)]
    pub lease_commence_date: Option<LeaseYear>,
}

/// Read-only postal code dataset.
#[derive(Debug, Clone, Default)]
pub struct PostalLookupTable {
    entries: HashMap<String, Vec<LocationRecord>>,
}

impl PostalLookupTable {
    /// A table with no entries; every resolution fails with
    /// [`ValidationError::LocationDataUnavailable`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::ArtifactUnavailable {
                artifact: "postal lookup table",
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigurationError> {
        let entries = serde_json::from_str(data).map_err(|e| ConfigurationError::InvalidArtifact {
            artifact: "postal lookup table",
            reason: e.to_string(),
        })?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a postal code using the first record stored for it.
    ///
    /// Checks, in order: the code is exactly six ASCII digits, the table is
    /// loaded, the code is present.
    pub fn resolve(&self, postal_code: &str) -> Result<ResolvedLocation, ValidationError> {
        if postal_code.len() != 6 || !postal_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidPostalCodeFormat(postal_code.to_string()));
        }
        if self.entries.is_empty() {
            return Err(ValidationError::LocationDataUnavailable);
        }
        let records = self
            .entries
            .get(postal_code)
            .ok_or_else(|| ValidationError::PostalCodeNotFound(postal_code.to_string()))?;

        let malformed = |reason: &str| ValidationError::MalformedLocationRecord {
            code: postal_code.to_string(),
            reason: reason.to_string(),
        };

        let record = records.first().ok_or_else(|| malformed("no location records"))?;
        let town = record.town.trim();
        if town.is_empty() {
            return Err(malformed("town is blank"));
        }
        let lease_commencement_year = record
            .lease_commence_date
            .as_ref()
            .ok_or_else(|| malformed("lease_commence_date is missing"))?
            .to_year()
            .ok_or_else(|| malformed("lease_commence_date is not a whole year"))?;

        tracing::debug!(
            postal_code,
            town,
            lease_commencement_year,
            "resolved postal code"
        );

        Ok(ResolvedLocation {
            town: town.to_string(),
            lease_commencement_year,
        })
    }
}
