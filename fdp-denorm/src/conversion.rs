//! Conversion lookups (weight-length and round-weight)
//!
//! The engine consumes conversions through the [`ConversionSource`] trait;
//! the persistence layer implements it over referential tables and is
//! expected to cache, since lookups happen inside the per-tree computation.

use fdp_common::referential::{LengthUnit, Sex};
use fdp_common::rounding::round_weight;
use fdp_common::Result;

use chrono::NaiveDate;

/// Filter for a weight-length conversion lookup
#[derive(Debug, Clone)]
pub struct WeightLengthFilter {
    pub taxon_group_id: Option<i32>,
    pub taxon_name_id: Option<i32>,
    /// Pmfm of the length measurement being converted
    pub length_pmfm_id: i32,
    pub sex: Sex,
    /// Fishing-area locations of the operation
    pub location_ids: Vec<i32>,
    pub month: u32,
    pub year: i32,
}

/// Allometric weight-length formula `W(g) = a · L(cm)^b`
#[derive(Debug, Clone, Copy)]
pub struct WeightLengthConversion {
    pub coefficient_a: f64,
    pub exponent_b: f64,
}

impl WeightLengthConversion {
    /// Apply the formula to a measured length.
    ///
    /// Half the measurement precision is added to the length first (the
    /// measured value is a length-class lower bound, the formula wants the
    /// class center). Result is an alive weight in kg, rounded to the
    /// persisted scale, multiplied by the individual count.
    pub fn compute_weight(
        &self,
        length: f64,
        unit: LengthUnit,
        precision: Option<f64>,
        individual_count: f64,
    ) -> f64 {
        let class_center = length + precision.unwrap_or(0.0) / 2.0;
        let length_cm = unit.to_cm(class_center);
        let grams = self.coefficient_a * length_cm.powf(self.exponent_b) * individual_count;
        round_weight(grams / 1000.0)
    }
}

/// Filter for a round-weight (alive) conversion lookup
#[derive(Debug, Clone)]
pub struct RoundWeightFilter {
    pub taxon_group_id: i32,
    pub dressing_id: i32,
    pub preservation_id: i32,
    pub country_location_id: i32,
    pub date: NaiveDate,
}

/// Coefficient converting a dressed/preserved weight to its alive
/// ("whole, fresh") equivalent by multiplication
#[derive(Debug, Clone, Copy)]
pub struct RoundWeightConversion {
    pub conversion_coefficient: f64,
}

/// Referential conversion lookups, implemented by the persistence layer.
///
/// An empty lookup result is not an error: it means the weight cannot be
/// converted (indeterminate), and the engine degrades accordingly.
pub trait ConversionSource: Send + Sync {
    fn find_weight_length_conversion(
        &self,
        filter: &WeightLengthFilter,
    ) -> Result<Option<WeightLengthConversion>>;

    fn find_round_weight_conversion(
        &self,
        filter: &RoundWeightFilter,
    ) -> Result<Option<RoundWeightConversion>>;
}

/// A source with no conversions at all, for offline runs and tests
pub struct NoConversions;

impl ConversionSource for NoConversions {
    fn find_weight_length_conversion(
        &self,
        _filter: &WeightLengthFilter,
    ) -> Result<Option<WeightLengthConversion>> {
        Ok(None)
    }

    fn find_round_weight_conversion(
        &self,
        _filter: &RoundWeightFilter,
    ) -> Result<Option<RoundWeightConversion>> {
        Ok(None)
    }
}
