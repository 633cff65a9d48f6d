//! # FDP Denormalization Engine
//!
//! Converts a nested, partially-sampled catch batch tree into a flat list
//! of records carrying inherited, indirect (bottom-up inferred) and
//! elevated (extrapolated-to-total) weights and individual counts.
//!
//! Pipeline per tree: arena build → context inheritance → alive-weight
//! factors → sampling ratio resolution → sampling weight recovery →
//! length-derived weights → elevation (factors, application, bottom-up
//! gap-fill) → flattening.
//!
//! The engine is pure computation; referential conversions, per-program
//! options and persistence are consumed through traits implemented by the
//! surrounding services.

pub mod arena;
pub mod conversion;
pub mod elevation;
pub mod engine;
pub mod flatten;
pub mod inheritance;
pub mod job;
pub mod options;
pub mod sampling;
pub mod weight;

pub use engine::DenormalizationEngine;
pub use job::{DenormalizationJob, JobReport, ResultStore, TreeRef, TreeSource};
pub use options::{CachedOptionsResolver, DenormalizationOptions, OptionsSource, ProgramRef};
