//! Per-program denormalization options and their cached resolution
//!
//! Assembling `DenormalizationOptions` requires several referential reads,
//! so the resolver caches one options struct per program id/label with a
//! short TTL. The cache is an explicitly constructed, injected component
//! owned by the composition root; there is no ambient/static state.

use fdp_common::{Error, Result};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Reference to a program, by id or by label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramRef {
    Id(i32),
    Label(String),
}

impl std::fmt::Display for ProgramRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramRef::Id(id) => write!(f, "program #{}", id),
            ProgramRef::Label(label) => write!(f, "program '{}'", label),
        }
    }
}

/// Feature flags and referential context driving one tree's
/// denormalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenormalizationOptions {
    // -- feature flags --
    /// Compute length-derived (RTP) weights on leaves
    pub enable_rtp_weight: bool,
    /// Convert weights to alive equivalent before elevation
    pub enable_alive_weight: bool,
    /// Taxon-name tracking (scientific species)
    pub enable_taxon_name: bool,
    /// Taxon-group tracking (commercial species)
    pub enable_taxon_group: bool,
    /// Downgrade the zero-weight-with-individuals failure to a warning
    pub allow_zero_weight_with_individual: bool,
    /// Recompute even when stored results look current (outer-loop
    /// concern; never suppresses data validation failures)
    pub force: bool,

    // -- context --
    /// Date of the operation or sale, used to filter conversions
    pub date: NaiveDate,
    /// Fishing-area locations used to filter weight-length conversions
    pub fishing_area_location_ids: Vec<i32>,
    /// Country location keying round-weight (alive) conversions
    pub round_weight_country_location_id: Option<i32>,

    /// Default dressing when a landing leaf has no dressing measurement
    pub default_landing_dressing_id: Option<i32>,
    /// Default dressing when a discard leaf has no dressing measurement
    pub default_discard_dressing_id: Option<i32>,
    pub default_landing_preservation_id: Option<i32>,
    pub default_discard_preservation_id: Option<i32>,

    /// Tolerated relative difference (percent) between a recorded weight
    /// and its recomputed length-derived value
    pub max_weight_diff_pct: f64,

    /// Taxon groups excluded from weight computation entirely
    pub weight_excluded_taxon_group_ids: Vec<i32>,

    /// Cap on the elevation fixed-point iteration
    pub max_elevation_passes: usize,
}

impl Default for DenormalizationOptions {
    fn default() -> Self {
        Self {
            enable_rtp_weight: false,
            enable_alive_weight: false,
            enable_taxon_name: true,
            enable_taxon_group: true,
            allow_zero_weight_with_individual: false,
            force: false,
            date: NaiveDate::default(),
            fishing_area_location_ids: Vec::new(),
            round_weight_country_location_id: None,
            default_landing_dressing_id: None,
            default_discard_dressing_id: None,
            default_landing_preservation_id: None,
            default_discard_preservation_id: None,
            max_weight_diff_pct: 10.0,
            weight_excluded_taxon_group_ids: Vec::new(),
            max_elevation_passes: 10,
        }
    }
}

impl DenormalizationOptions {
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Fail fast before any computation when a feature flag is enabled
    /// without the context it needs
    pub fn check_preconditions(&self) -> Result<()> {
        if self.enable_rtp_weight {
            if self.round_weight_country_location_id.is_none() {
                return Err(Error::MissingOption(
                    "round_weight_country_location_id is required when RTP weights are enabled"
                        .into(),
                ));
            }
            if self.fishing_area_location_ids.is_empty() {
                return Err(Error::MissingOption(
                    "fishing_area_location_ids is required when RTP weights are enabled".into(),
                ));
            }
        }
        if self.enable_alive_weight && self.round_weight_country_location_id.is_none() {
            return Err(Error::MissingOption(
                "round_weight_country_location_id is required when alive weights are enabled"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Default dressing id for a leaf, keyed by landing vs discard
    pub fn default_dressing_id(&self, is_discard: bool) -> Option<i32> {
        if is_discard {
            self.default_discard_dressing_id
        } else {
            self.default_landing_dressing_id
        }
    }

    /// Default preservation id for a leaf, keyed by landing vs discard
    pub fn default_preservation_id(&self, is_discard: bool) -> Option<i32> {
        if is_discard {
            self.default_discard_preservation_id
        } else {
            self.default_landing_preservation_id
        }
    }
}

/// Loads options for one program from referential data. Implemented by the
/// persistence layer; the core only sees this trait.
pub trait OptionsSource: Send + Sync {
    fn load(&self, program: &ProgramRef) -> Result<DenormalizationOptions>;
}

struct CacheEntry {
    loaded_at: Instant,
    options: Arc<DenormalizationOptions>,
}

/// Read-through, thread-safe TTL cache over an [`OptionsSource`].
///
/// The TTL (≈5 minutes by default) balances referential staleness against
/// the cost of re-assembling options from several referential reads.
pub struct CachedOptionsResolver {
    source: Arc<dyn OptionsSource>,
    ttl: Duration,
    entries: Mutex<HashMap<ProgramRef, CacheEntry>>,
}

impl CachedOptionsResolver {
    pub fn new(source: Arc<dyn OptionsSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve options for a program, loading through the source when the
    /// cached entry is absent or expired
    pub fn resolve(&self, program: &ProgramRef) -> Result<Arc<DenormalizationOptions>> {
        {
            let entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(entry) = entries.get(program) {
                if entry.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.options));
                }
            }
        }

        let options = Arc::new(self.source.load(program)?);
        tracing::debug!("Loaded denormalization options for {}", program);

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(
            program.clone(),
            CacheEntry {
                loaded_at: Instant::now(),
                options: Arc::clone(&options),
            },
        );
        Ok(options)
    }

    /// Drop one cached entry
    pub fn invalidate(&self, program: &ProgramRef) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(program);
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        loads: AtomicUsize,
    }

    impl OptionsSource for CountingSource {
        fn load(&self, _program: &ProgramRef) -> Result<DenormalizationOptions> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(DenormalizationOptions::default())
        }
    }

    #[test]
    fn test_cache_hits_within_ttl() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let resolver =
            CachedOptionsResolver::new(source.clone(), Duration::from_secs(300));
        let program = ProgramRef::Label("OBS-SEA".into());

        resolver.resolve(&program).unwrap();
        resolver.resolve(&program).unwrap();
        resolver.resolve(&program).unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_reloads_after_ttl() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let resolver = CachedOptionsResolver::new(source.clone(), Duration::ZERO);
        let program = ProgramRef::Id(7);

        resolver.resolve(&program).unwrap();
        resolver.resolve(&program).unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
        });
        let resolver =
            CachedOptionsResolver::new(source.clone(), Duration::from_secs(300));
        let program = ProgramRef::Id(7);

        resolver.resolve(&program).unwrap();
        resolver.invalidate(&program);
        resolver.resolve(&program).unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rtp_preconditions() {
        let mut options = DenormalizationOptions {
            enable_rtp_weight: true,
            ..Default::default()
        };
        assert!(options.check_preconditions().is_err());

        options.round_weight_country_location_id = Some(99);
        assert!(options.check_preconditions().is_err());

        options.fishing_area_location_ids = vec![101];
        assert!(options.check_preconditions().is_ok());
    }

    #[test]
    fn test_alive_weight_preconditions() {
        let options = DenormalizationOptions {
            enable_alive_weight: true,
            ..Default::default()
        };
        assert!(options.check_preconditions().is_err());
    }
}
