//! Referential value types used by the denormalization core
//!
//! These are the small, closed vocabularies the core needs to reason about
//! (quality flags, sorting-measurement kinds, length units, sexes, weight
//! methods). Open-ended referential data (taxa, locations, pmfms) stays as
//! plain integer ids resolved by the persistence layer.

use serde::{Deserialize, Serialize};

/// Quality flag of a batch, ordered by severity.
///
/// The severity order is a total order: `worst(a, b)` picks the flag with
/// the higher severity rank. Flags at or above [`QualityFlag::Bad`] are
/// "invalid" and suppress unsafe weight summation on their branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    NotQualified,
    Good,
    OutOfStats,
    Doubtful,
    Bad,
    Conflictual,
    NotCompleted,
    Missing,
}

impl QualityFlag {
    /// Referential id of the flag
    pub fn id(&self) -> i32 {
        match self {
            QualityFlag::NotQualified => 0,
            QualityFlag::Good => 1,
            QualityFlag::OutOfStats => 2,
            QualityFlag::Doubtful => 3,
            QualityFlag::Bad => 4,
            QualityFlag::Conflictual => 5,
            QualityFlag::NotCompleted => 8,
            QualityFlag::Missing => 9,
        }
    }

    /// Parse from a referential id
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(QualityFlag::NotQualified),
            1 => Some(QualityFlag::Good),
            2 => Some(QualityFlag::OutOfStats),
            3 => Some(QualityFlag::Doubtful),
            4 => Some(QualityFlag::Bad),
            5 => Some(QualityFlag::Conflictual),
            8 => Some(QualityFlag::NotCompleted),
            9 => Some(QualityFlag::Missing),
            _ => None,
        }
    }

    /// Severity rank used by [`QualityFlag::worst`]; higher is worse
    pub fn severity(&self) -> u8 {
        match self {
            QualityFlag::NotQualified => 0,
            QualityFlag::Good => 1,
            QualityFlag::OutOfStats => 2,
            QualityFlag::Doubtful => 3,
            QualityFlag::Bad => 4,
            QualityFlag::Conflictual => 5,
            QualityFlag::NotCompleted => 6,
            QualityFlag::Missing => 7,
        }
    }

    /// An invalid flag forces `exhaustive_inventory` to false on its node
    /// and the node's immediate parent
    pub fn is_invalid(&self) -> bool {
        self.severity() >= QualityFlag::Bad.severity()
    }

    /// The worse of two flags under the severity order
    pub fn worst(a: QualityFlag, b: QualityFlag) -> QualityFlag {
        if b.severity() > a.severity() {
            b
        } else {
            a
        }
    }
}

/// Kind of a sorting measurement, classified by the batch tree loader.
///
/// The core only needs to distinguish the measurements that drive weight
/// conversions; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortingKind {
    /// Dressing state (whole, gutted, ...)
    Dressing,
    /// Preservation state (fresh, frozen, ...)
    Preservation,
    /// Sex of the sampled individuals
    Sex,
    /// A length measurement usable for weight-length conversion
    Length,
    /// Any other sorting criterion
    Other,
}

/// Length measurement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Millimeter,
    Centimeter,
}

impl LengthUnit {
    /// Convert a value in this unit to centimeters
    pub fn to_cm(&self, value: f64) -> f64 {
        match self {
            LengthUnit::Millimeter => value / 10.0,
            LengthUnit::Centimeter => value,
        }
    }
}

/// Sex of sampled individuals; weight-length conversions are filtered by
/// sex, defaulting to unsexed when no sex measurement is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Unsexed,
    Male,
    Female,
}

impl Sex {
    /// Parse from a qualitative value id; unknown ids fall back to unsexed
    pub fn from_qualitative_value(id: Option<i32>) -> Sex {
        match id {
            Some(1) => Sex::Male,
            Some(2) => Sex::Female,
            _ => Sex::Unsexed,
        }
    }
}

impl Default for Sex {
    fn default() -> Self {
        Sex::Unsexed
    }
}

/// How a batch weight was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMethod {
    /// Weighed on board or at landing
    Measured,
    /// Visually estimated by the observer
    Estimated,
    /// Computed from a length measurement via a weight-length formula
    CalculatedFromLength,
    /// Computed as a sum of per-length-class calculated weights
    CalculatedFromLengthSum,
}

impl WeightMethod {
    /// True when the weight was derived from lengths rather than observed;
    /// such weights may be silently replaced when a fresher length-derived
    /// value disagrees beyond tolerance
    pub fn calculated(&self) -> bool {
        matches!(
            self,
            WeightMethod::CalculatedFromLength | WeightMethod::CalculatedFromLengthSum
        )
    }
}
