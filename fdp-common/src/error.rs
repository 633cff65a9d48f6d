//! Common error types for the fisheries data platform

use thiserror::Error;

/// Common result type for FDP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across FDP services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required denormalization option is missing while its feature flag
    /// is enabled (checked before any computation starts)
    #[error("Missing denormalization option: {0}")]
    MissingOption(String),

    /// A sampling batch whose ratio cannot be resolved or whose sampled
    /// weight exceeds its exhaustive parent's weight
    #[error("Invalid sampling batch #{id} ({label}): {reason}")]
    InvalidSamplingBatch {
        id: i64,
        label: String,
        reason: String,
    },

    /// An elevated weight of exactly zero on a batch that still carries
    /// elevated individuals
    #[error("Batch #{id} ({label}) has an elevated weight of 0 but {individual_count} elevated individuals")]
    ZeroWeightWithIndividuals {
        id: i64,
        label: String,
        individual_count: i64,
    },

    /// Referential / conversion lookup failure
    #[error("Conversion lookup error: {0}")]
    Lookup(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for data-quality failures that are recoverable at tree
    /// granularity: the job driver logs them, counts the tree as invalid
    /// and continues with the next tree. Never retried automatically.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::MissingOption(_)
                | Error::InvalidSamplingBatch { .. }
                | Error::ZeroWeightWithIndividuals { .. }
        )
    }
}
