//! Job configuration loading
//!
//! Resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. `FDP_CONFIG` environment variable
//! 3. `fdp.toml` in the working directory
//! 4. Compiled defaults (fallback)
//!
//! A missing config file never causes termination: the job falls back to
//! defaults with a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default page size for the outer denormalization loops
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default number of concurrently processed trees
pub const DEFAULT_WORKERS: usize = 4;

/// Default TTL of the per-program options cache, seconds
pub const DEFAULT_OPTIONS_TTL_SECS: u64 = 300;

/// Default cap on elevation fixed-point passes
pub const DEFAULT_MAX_ELEVATION_PASSES: usize = 10;

/// Denormalization job configuration (TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Trees loaded per page in the outer loops
    pub page_size: usize,

    /// Trees processed concurrently (one tree per worker)
    pub workers: usize,

    /// TTL of the cached per-program denormalization options, seconds
    pub options_ttl_secs: u64,

    /// Cap on the elevation fixed-point iteration
    pub max_elevation_passes: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            workers: DEFAULT_WORKERS,
            options_ttl_secs: DEFAULT_OPTIONS_TTL_SECS,
            max_elevation_passes: DEFAULT_MAX_ELEVATION_PASSES,
        }
    }
}

impl JobConfig {
    /// Load configuration following the 4-tier priority order.
    ///
    /// `cli_path` is the `--config` argument when given. Any tier that is
    /// absent falls through to the next; a file that exists but does not
    /// parse is an error (misconfiguration should be loud).
    pub fn load(cli_path: Option<&Path>) -> Result<JobConfig> {
        // Priority 1: command-line argument
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var("FDP_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        // Priority 3: fdp.toml in the working directory
        let local = PathBuf::from("fdp.toml");
        if local.exists() {
            return Self::from_file(&local);
        }

        // Priority 4: compiled defaults
        tracing::warn!("No job configuration found, using compiled defaults");
        Ok(JobConfig::default())
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<JobConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))
    }

    /// Sanity-check values that would silently disable the job
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        if self.max_elevation_passes == 0 {
            return Err(Error::Config(
                "max_elevation_passes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JobConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.options_ttl_secs, DEFAULT_OPTIONS_TTL_SECS);
        assert_eq!(config.max_elevation_passes, DEFAULT_MAX_ELEVATION_PASSES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: JobConfig = toml::from_str("workers = 8").unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config: JobConfig = toml::from_str("workers = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
