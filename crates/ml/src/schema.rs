//! Feature schema: the ordered feature list the model was fit on.
//!
//! The order of [`HDB_FEATURE_NAMES`] MUST match the training pipeline
//! exactly; any change is a breaking change for every model and scaler
//! artifact.
//!
//! Slot indices for scalars and one-hot members are resolved once when a
//! [`FeatureSchema`] is constructed, so encoding writes by index and never
//! looks features up by string.

use std::collections::{BTreeMap, HashSet};

use crate::error::ConfigurationError;

/// Width of the built-in schema.
pub const NUM_FEATURES: usize = 60;

const SCALAR_COUNT: usize = 6;
const GROUP_COUNT: usize = 3;

/// Feature order used by the production model.
pub const HDB_FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "floor_area_sqm",
    "postal",
    "storey_avg",
    "sale_year",
    "sale_month",
    "remaining_lease_years",
    "flat_type_1 ROOM",
    "flat_type_2 ROOM",
    "flat_type_3 ROOM",
    "flat_type_4 ROOM",
    "flat_type_5 ROOM",
    "flat_type_EXECUTIVE",
    "flat_type_MULTI-GENERATION",
    "flat_model_2-ROOM",
    "flat_model_3GEN",
    "flat_model_ADJOINED FLAT",
    "flat_model_APARTMENT",
    "flat_model_DBSS",
    "flat_model_IMPROVED",
    "flat_model_IMPROVED-MAISONETTE",
    "flat_model_MAISONETTE",
    "flat_model_MODEL A",
    "flat_model_MODEL A-MAISONETTE",
    "flat_model_MODEL A2",
    "flat_model_MULTI GENERATION",
    "flat_model_NEW GENERATION",
    "flat_model_PREMIUM APARTMENT",
    "flat_model_PREMIUM APARTMENT LOFT",
    "flat_model_PREMIUM MAISONETTE",
    "flat_model_SIMPLIFIED",
    "flat_model_STANDARD",
    "flat_model_TERRACE",
    "flat_model_TYPE S1",
    "flat_model_TYPE S2",
    "town_ANG MO KIO",
    "town_BEDOK",
    "town_BISHAN",
    "town_BUKIT BATOK",
    "town_BUKIT MERAH",
    "town_BUKIT PANJANG",
    "town_BUKIT TIMAH",
    "town_CENTRAL AREA",
    "town_CHOA CHU KANG",
    "town_CLEMENTI",
    "town_GEYLANG",
    "town_HOUGANG",
    "town_JURONG EAST",
    "town_JURONG WEST",
    "town_KALLANG/WHAMPOA",
    "town_MARINE PARADE",
    "town_PASIR RIS",
    "town_PUNGGOL",
    "town_QUEENSTOWN",
    "town_SEMBAWANG",
    "town_SENGKANG",
    "town_SERANGOON",
    "town_TAMPINES",
    "town_TOA PAYOH",
    "town_WOODLANDS",
    "town_YISHUN",
];

/// Plain numeric features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFeature {
    FloorAreaSqm,
    /// The postal code read as a number; optional in a schema.
    Postal,
    StoreyAvg,
    SaleYear,
    SaleMonth,
    RemainingLeaseYears,
}

impl ScalarFeature {
    pub const ALL: [ScalarFeature; SCALAR_COUNT] = [
        ScalarFeature::FloorAreaSqm,
        ScalarFeature::Postal,
        ScalarFeature::StoreyAvg,
        ScalarFeature::SaleYear,
        ScalarFeature::SaleMonth,
        ScalarFeature::RemainingLeaseYears,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarFeature::FloorAreaSqm => "floor_area_sqm",
            ScalarFeature::Postal => "postal",
            ScalarFeature::StoreyAvg => "storey_avg",
            ScalarFeature::SaleYear => "sale_year",
            ScalarFeature::SaleMonth => "sale_month",
            ScalarFeature::RemainingLeaseYears => "remaining_lease_years",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn is_required(self) -> bool {
        self != ScalarFeature::Postal
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

/// One-hot encoded categorical attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryGroup {
    Town,
    FlatType,
    FlatModel,
}

impl CategoryGroup {
    pub const ALL: [CategoryGroup; GROUP_COUNT] = [
        CategoryGroup::Town,
        CategoryGroup::FlatType,
        CategoryGroup::FlatModel,
    ];

    /// Feature name prefix; the remainder of the name is the category value.
    pub fn prefix(self) -> &'static str {
        match self {
            CategoryGroup::Town => "town_",
            CategoryGroup::FlatType => "flat_type_",
            CategoryGroup::FlatModel => "flat_model_",
        }
    }

    /// Human-readable group name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            CategoryGroup::Town => "town",
            CategoryGroup::FlatType => "flat type",
            CategoryGroup::FlatModel => "flat model",
        }
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

/// Validated, ordered feature list with precomputed slot indices.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    names: Vec<String>,
    scalar_slots: [Option<usize>; SCALAR_COUNT],
    group_slots: [BTreeMap<String, usize>; GROUP_COUNT],
}

impl FeatureSchema {
    /// The schema of the production model.
    pub fn hdb_resale() -> Self {
        Self::from_names(&HDB_FEATURE_NAMES).expect("built-in feature list is a valid schema")
    }

    /// Build a schema from an ordered name list.
    ///
    /// Every name must be a known scalar or `<group prefix><value>`; names are
    /// unique; every group has at least one member; all scalars except
    /// `postal` are present.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigurationError> {
        let mut scalar_slots = [None; SCALAR_COUNT];
        let mut group_slots: [BTreeMap<String, usize>; GROUP_COUNT] = Default::default();
        let mut seen = HashSet::with_capacity(names.len());

        for (idx, name) in names.iter().map(AsRef::as_ref).enumerate() {
            if !seen.insert(name) {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "duplicate feature name {name:?}"
                )));
            }

            if let Some(scalar) = ScalarFeature::from_name(name) {
                scalar_slots[scalar.ordinal()] = Some(idx);
                continue;
            }

            let group = CategoryGroup::ALL
                .into_iter()
                .find(|g| name.starts_with(g.prefix()))
                .ok_or_else(|| {
                    ConfigurationError::InvalidSchema(format!("unrecognized feature name {name:?}"))
                })?;
            let value = &name[group.prefix().len()..];
            if value.is_empty() {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "feature {name:?} has an empty category value"
                )));
            }
            group_slots[group.ordinal()].insert(value.to_string(), idx);
        }

        for scalar in ScalarFeature::ALL {
            if scalar.is_required() && scalar_slots[scalar.ordinal()].is_none() {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "required feature {:?} is missing",
                    scalar.name()
                )));
            }
        }
        for group in CategoryGroup::ALL {
            if group_slots[group.ordinal()].is_empty() {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "category group {:?} has no members",
                    group.prefix()
                )));
            }
        }

        Ok(Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            scalar_slots,
            group_slots,
        })
    }

    /// Feature names in model order.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Number of features (N).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Group prefix → sorted valid category values.
    pub fn category_groups(&self) -> BTreeMap<&'static str, Vec<&str>> {
        CategoryGroup::ALL
            .into_iter()
            .map(|g| (g.prefix(), self.categories(g).collect()))
            .collect()
    }

    /// Valid values of one group, sorted.
    pub fn categories(&self, group: CategoryGroup) -> impl Iterator<Item = &str> + '_ {
        self.group_slots[group.ordinal()].keys().map(String::as_str)
    }

    pub fn scalar_slot(&self, feature: ScalarFeature) -> Option<usize> {
        self.scalar_slots[feature.ordinal()]
    }

    /// Slot of `prefix + value`, or `None` if `value` is not a member.
    pub fn category_slot(&self, group: CategoryGroup, value: &str) -> Option<usize> {
        self.group_slots[group.ordinal()].get(value).copied()
    }

    /// All slots belonging to a group.
    pub fn group_slots(&self, group: CategoryGroup) -> impl Iterator<Item = usize> + '_ {
        self.group_slots[group.ordinal()].values().copied()
    }
}
