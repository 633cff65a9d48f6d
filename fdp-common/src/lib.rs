//! # FDP Common Library
//!
//! Shared code for the fisheries data platform services including:
//! - Batch tree input model (`BatchNode`, `SortingValue`)
//! - Denormalized output model (`DenormalizedBatch`)
//! - Referential value types (quality flags, sex, units, weight methods)
//! - Decimal rounding utilities (half-up, fixed scale)
//! - Job configuration loading
//! - Common error types

pub mod batch;
pub mod config;
pub mod denormalized;
pub mod error;
pub mod referential;
pub mod rounding;

pub use batch::{BatchNode, SortingValue};
pub use denormalized::DenormalizedBatch;
pub use error::{Error, Result};
pub use referential::{LengthUnit, QualityFlag, Sex, SortingKind, WeightMethod};
