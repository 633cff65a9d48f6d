//! Denormalization engine
//!
//! Orchestrates the passes for one catch batch tree and returns the flat
//! list. Pure computation: no persistence, no shared mutable state; the
//! only I/O is the (cached) conversion lookups behind the injected
//! [`ConversionSource`].

use crate::arena::{NodeArena, WeightFamily};
use crate::conversion::ConversionSource;
use crate::options::DenormalizationOptions;
use crate::{elevation, flatten, inheritance, sampling, weight};

use fdp_common::{BatchNode, DenormalizedBatch, Result};

use std::sync::Arc;

/// The denormalization engine. Cheap to clone and share; one instance can
/// process many trees, one tree per call, concurrently from many threads.
#[derive(Clone)]
pub struct DenormalizationEngine {
    conversions: Arc<dyn ConversionSource>,
}

impl DenormalizationEngine {
    pub fn new(conversions: Arc<dyn ConversionSource>) -> Self {
        Self { conversions }
    }

    /// Denormalize one catch batch tree.
    ///
    /// The tree is owned by this call and discarded; the result is the
    /// flat record list in pre-order, ready for full-replace persistence.
    ///
    /// # Errors
    /// Precondition failures (`MissingOption`) abort before any
    /// computation; `InvalidSamplingBatch` / `ZeroWeightWithIndividuals`
    /// abort this tree only and are recoverable at job level.
    pub fn denormalize(
        &self,
        tree: &BatchNode,
        options: &DenormalizationOptions,
    ) -> Result<Vec<DenormalizedBatch>> {
        options.check_preconditions()?;

        let mut arena = NodeArena::from_tree(tree);
        tracing::debug!(
            root_id = tree.id,
            nodes = arena.len(),
            "Denormalizing catch batch tree"
        );

        inheritance::resolve(&mut arena, options);
        weight::resolve_alive_factors(&mut arena, options, self.conversions.as_ref())?;
        sampling::resolve(&mut arena, options)?;
        weight::recover_sampling_weights(&mut arena, WeightFamily::AsRecorded, options);
        weight::resolve_rtp_weights(&mut arena, options, self.conversions.as_ref())?;
        weight::recover_sampling_weights(&mut arena, WeightFamily::LengthDerived, options);
        elevation::compute(&mut arena, options)?;

        Ok(flatten::emit(arena))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::NoConversions;

    fn engine() -> DenormalizationEngine {
        DenormalizationEngine::new(Arc::new(NoConversions))
    }

    #[test]
    fn test_trivial_tree() {
        let mut root = BatchNode::new(1, "CATCH_BATCH#1");
        root.weight = Some(12.5);

        let flat = engine()
            .denormalize(&root, &DenormalizationOptions::default())
            .unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].final_elevate_weight(), Some(12.5));
        assert_eq!(flat[0].flat_rank_order, 1);
        assert_eq!(flat[0].tree_level, 1);
    }

    #[test]
    fn test_preconditions_checked_before_computation() {
        let options = DenormalizationOptions {
            enable_rtp_weight: true,
            ..Default::default()
        };
        let root = BatchNode::new(1, "CATCH_BATCH#1");
        let err = engine().denormalize(&root, &options).unwrap_err();
        assert!(matches!(err, fdp_common::Error::MissingOption(_)));
    }
}
