//! Elevation: extrapolating sampled values to full-population totals
//!
//! Top-down pass accumulating elevation factors once sampling factors are
//! resolved, application of the factors to every weight family with a
//! usable context value, then a bottom-up gap-fill for nodes with no
//! context weight anywhere in a family, iterated to a fixed point.

use crate::arena::{NodeArena, NodeId, WeightFamily};
use crate::options::DenormalizationOptions;
use crate::weight;

use fdp_common::rounding::{round_count, round_weight};
use fdp_common::{Error, Result};

/// Run the full elevation stage on a tree
pub fn compute(arena: &mut NodeArena, options: &DenormalizationOptions) -> Result<()> {
    compute_factors(arena);
    for id in arena.preorder() {
        apply_factors(arena, id);
    }
    fill_missing_elevated(arena, options);
    check_zero_weights(arena, options)
}

/// Accumulate elevation factors from the root down:
/// - context factor: product of sampling factors along the path;
/// - taxon factor: same recursion, restarted at the first taxon-bearing
///   node of a chain, unset while no taxon is present;
/// - final factor: context factor combined with the alive-weight factor.
fn compute_factors(arena: &mut NodeArena) {
    for id in arena.preorder() {
        let sampling_factor = arena[id].sampling_factor.unwrap_or(1.0);

        let (context_factor, taxon_factor) = match arena[id].parent {
            None => {
                let taxon = arena[id].has_taxon().then_some(sampling_factor);
                (sampling_factor, taxon)
            }
            Some(parent) => {
                let context =
                    sampling_factor * arena[parent].elevate_context_factor.unwrap_or(1.0);
                let taxon = arena[id].has_taxon().then(|| {
                    sampling_factor * arena[parent].taxon_elevate_factor.unwrap_or(1.0)
                });
                (context, taxon)
            }
        };

        let node = &mut arena[id];
        node.elevate_context_factor = Some(context_factor);
        node.taxon_elevate_factor = taxon_factor;
        node.elevate_factor = Some(match node.alive_weight_factor {
            Some(alive) => context_factor * alive,
            None => context_factor,
        });
    }
}

/// Produce elevated weights and counts wherever the underlying context
/// value is known. Weights are rounded half-up to 6 decimals, counts to
/// integers.
fn apply_factors(arena: &mut NodeArena, id: NodeId) {
    let context_factor = arena[id].elevate_context_factor.unwrap_or(1.0);
    let taxon_factor = arena[id].taxon_elevate_factor;
    let elevate_factor = arena[id].elevate_factor.unwrap_or(1.0);

    let alive = alive_or_one(arena, id);
    if let Some(context_kg) = arena[id].context_weight(WeightFamily::AsRecorded) {
        arena[id].set_direct_weight(WeightFamily::Elevated, round_weight(context_kg * elevate_factor));
        arena[id].elevate_context_weight = Some(round_weight(context_kg * context_factor));
        arena[id].taxon_elevate_weight =
            taxon_factor.map(|tf| round_weight(context_kg * tf * alive));
    }

    if let Some(rtp_kg) = arena[id].context_weight(WeightFamily::LengthDerived) {
        arena[id].set_direct_weight(
            WeightFamily::ElevatedLengthDerived,
            round_weight(rtp_kg * elevate_factor),
        );
    }

    if let Some(count) = arena[id].individual_count {
        let count = count as f64;
        let node = &mut arena[id];
        node.elevate_context_individual_count = Some(round_count(count * context_factor));
        node.taxon_elevate_individual_count = taxon_factor.map(|tf| round_count(count * tf));
        // the alive conversion never applies to counts
        node.elevate_individual_count = Some(round_count(count * context_factor));
    }
}

fn alive_or_one(arena: &NodeArena, id: NodeId) -> f64 {
    arena[id].alive_weight_factor.unwrap_or(1.0)
}

/// Bottom-up gap-fill: nodes with no usable context weight in a family
/// derive their elevated value from already-elevated descendants (or
/// sampling recovery), iterated until nothing changes or the pass cap is
/// reached.
fn fill_missing_elevated(arena: &mut NodeArena, options: &DenormalizationOptions) {
    let order: Vec<NodeId> = arena.preorder().into_iter().rev().collect();
    let max_passes = options.max_elevation_passes.max(1);

    for pass in 0..max_passes {
        let mut changed = false;
        for &id in &order {
            for family in [WeightFamily::Elevated, WeightFamily::ElevatedLengthDerived] {
                if arena[id].context_weight(family).is_none()
                    && weight::resolve_indirect_weight(arena, id, family, true, options).is_some()
                {
                    changed = true;
                }
            }
        }
        if !changed {
            if pass > 0 {
                tracing::debug!(passes = pass + 1, "Elevation gap-fill converged");
            }
            return;
        }
    }
    tracing::warn!(
        max_passes,
        "Elevation gap-fill did not converge within the pass cap"
    );
}

/// A final elevated weight of exactly zero with elevated individuals left
/// is a data error, downgradable to a warning by configuration
fn check_zero_weights(arena: &NodeArena, options: &DenormalizationOptions) -> Result<()> {
    for id in arena.preorder() {
        let weight = arena[id].context_weight(WeightFamily::Elevated);
        let count = arena[id].elevate_individual_count.unwrap_or(0);
        if weight == Some(0.0) && count > 0 {
            if options.allow_zero_weight_with_individual {
                tracing::warn!(
                    batch_id = arena[id].id,
                    label = %arena[id].label,
                    individual_count = count,
                    "Elevated weight is 0 but elevated individuals remain"
                );
            } else {
                return Err(Error::ZeroWeightWithIndividuals {
                    id: arena[id].id,
                    label: arena[id].label.clone(),
                    individual_count: count,
                });
            }
        }
    }
    Ok(())
}
