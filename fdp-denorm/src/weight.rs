//! Weight resolution
//!
//! One generic indirect-weight algorithm parametrized over the four weight
//! families, plus the two conversions that feed it: round-weight ("alive")
//! coefficients and weight-length ("RTP") formulas.
//!
//! "Indeterminate" is not an error here: a `None` simply means that branch
//! cannot be resolved further, and elevation degrades accordingly.

use crate::arena::{NodeArena, NodeId, WeightFamily};
use crate::conversion::{ConversionSource, RoundWeightFilter, WeightLengthFilter};
use crate::options::DenormalizationOptions;

use fdp_common::referential::{LengthUnit, Sex, SortingKind};
use fdp_common::rounding::{approx_eq_opt, round_weight};
use fdp_common::Result;

/// Generic indirect-weight resolution for one node and one family.
///
/// Memoized into the node's indirect cell. Order of resolution:
/// 1. already computed ⇒ return it;
/// 2. sampling-batch recovery (parent context weight × ratio) when
///    `apply_sampling_ratio`;
/// 3. parent-of-sampling-batch recovery (child context weight × factor);
/// 4. children sum, only under an exhaustive inventory where all children
///    share one alive-weight factor; any unresolved child aborts the sum;
/// 5. otherwise indeterminate.
pub fn resolve_indirect_weight(
    arena: &mut NodeArena,
    id: NodeId,
    family: WeightFamily,
    apply_sampling_ratio: bool,
    options: &DenormalizationOptions,
) -> Option<f64> {
    if let Some(existing) = arena[id].indirect_weight(family) {
        return Some(existing);
    }

    let computed = compute_indirect_weight(arena, id, family, apply_sampling_ratio, options);
    if let Some(value) = computed {
        arena[id].set_indirect_weight(family, value);
    }
    computed
}

fn compute_indirect_weight(
    arena: &mut NodeArena,
    id: NodeId,
    family: WeightFamily,
    apply_sampling_ratio: bool,
    options: &DenormalizationOptions,
) -> Option<f64> {
    if apply_sampling_ratio {
        // a sampling batch is a known fraction of its parent
        if arena[id].is_sampling_batch() {
            if let Some(value) = recover_from_parent(arena, id, family) {
                return Some(value);
            }
        }
        // a parent of a sampling batch is its child scaled back up
        if let Some(child) = sampling_child(arena, id) {
            if let Some(value) = recover_from_sampling_child(arena, child, family) {
                return Some(value);
            }
        }
    }

    let children = arena.children_of(id);
    if children.is_empty() {
        return None;
    }

    // summing requires a complete inventory and one common dressing/
    // preservation context, else the sum would mix incomparable weights
    if !arena[id].exhaustive_inventory {
        return None;
    }
    if !children_share_alive_factor(arena, &children, options) {
        return None;
    }
    // a sampling batch is a fraction of its parent, not a member of a
    // partition; any such child invalidates the sum
    if children.iter().any(|&c| arena[c].is_sampling_batch()) {
        return None;
    }

    let mut sum = 0.0;
    for child in children {
        let value = arena[child]
            .context_weight(family)
            .or_else(|| resolve_indirect_weight(arena, child, family, apply_sampling_ratio, options));
        match value {
            Some(v) => sum += v,
            // one unresolved child makes the whole sum indeterminate
            None => return None,
        }
    }
    Some(round_weight(sum))
}

/// Sampling-batch weight recovery: parent context weight × sampling ratio.
/// For the elevated families the ratio cancels against the accumulated
/// factor, so the sample's extrapolated total is its parent's total.
fn recover_from_parent(arena: &NodeArena, id: NodeId, family: WeightFamily) -> Option<f64> {
    let parent = arena[id].parent?;
    let ratio = arena[id].sampling_ratio?;
    let parent_weight = arena[parent].context_weight(family)?;
    if family.is_elevated() {
        return (ratio > 0.0).then_some(parent_weight);
    }
    Some(round_weight(parent_weight * ratio))
}

/// The only child of `id`, when that child is a resolved sampling batch
fn sampling_child(arena: &NodeArena, id: NodeId) -> Option<NodeId> {
    let children = &arena[id].children;
    if children.len() != 1 {
        return None;
    }
    let child = children[0];
    arena[child].is_sampling_batch().then_some(child)
}

/// Parent-of-sampling-batch recovery: invert the child's ratio. Elevated
/// families adopt the child's total unscaled (same cancellation).
fn recover_from_sampling_child(
    arena: &NodeArena,
    child: NodeId,
    family: WeightFamily,
) -> Option<f64> {
    let factor = arena[child].sampling_factor?;
    let child_weight = arena[child].context_weight(family)?;
    if family.is_elevated() {
        return (factor > 0.0).then_some(child_weight);
    }
    Some(round_weight(child_weight * factor))
}

/// Resolve indirect weights of one raw family tree-wide, with sampling
/// recovery enabled.
///
/// Pre-order, so a chain of weightless sampling batches resolves from its
/// topmost known weight in a single sweep: each node finds its parent's
/// context weight already memoized. The recovered values are what the
/// elevation factors apply to.
pub fn recover_sampling_weights(
    arena: &mut NodeArena,
    family: WeightFamily,
    options: &DenormalizationOptions,
) {
    for id in arena.preorder() {
        resolve_indirect_weight(arena, id, family, true, options);
    }
}

/// True when every child resolves to the same alive-weight factor
/// (all-absent counts as shared; mixed absent/present does not)
fn children_share_alive_factor(
    arena: &NodeArena,
    children: &[NodeId],
    options: &DenormalizationOptions,
) -> bool {
    if !options.enable_alive_weight {
        return true;
    }
    let first = arena[children[0]].alive_weight_factor;
    children
        .iter()
        .all(|&c| approx_eq_opt(arena[c].alive_weight_factor, first))
}

/// Resolve the alive-weight factor of every node, children before parents.
///
/// Leaves look their coefficient up by taxon group, dressing, preservation,
/// country and date; non-leaves take the common factor of their children
/// (indeterminate when children disagree).
pub fn resolve_alive_factors(
    arena: &mut NodeArena,
    options: &DenormalizationOptions,
    conversions: &dyn ConversionSource,
) -> Result<()> {
    if !options.enable_alive_weight {
        return Ok(());
    }

    // reversed pre-order puts every child before its parent
    for id in arena.preorder().into_iter().rev() {
        let factor = if arena[id].is_leaf() {
            leaf_alive_factor(arena, id, options, conversions)?
        } else {
            let children = arena.children_of(id);
            let first = arena[children[0]].alive_weight_factor;
            let shared = children
                .iter()
                .all(|&c| approx_eq_opt(arena[c].alive_weight_factor, first));
            if shared {
                first
            } else {
                None
            }
        };
        arena[id].alive_weight_factor = factor;
    }
    Ok(())
}

/// Round-weight coefficient for one leaf, or `None` when the leaf has no
/// usable taxon group or no matching conversion
fn leaf_alive_factor(
    arena: &NodeArena,
    id: NodeId,
    options: &DenormalizationOptions,
    conversions: &dyn ConversionSource,
) -> Result<Option<f64>> {
    let node = &arena[id];

    let taxon_group_id = match node.taxon_group() {
        Some(tg) if !options.weight_excluded_taxon_group_ids.contains(&tg) => tg,
        _ => return Ok(None),
    };
    let country_location_id = match options.round_weight_country_location_id {
        Some(id) => id,
        None => return Ok(None),
    };

    let is_discard = node.is_discard.unwrap_or(false);
    let dressing_id = sorting_qualitative_value(&node.sorting_values, SortingKind::Dressing)
        .or_else(|| options.default_dressing_id(is_discard));
    let preservation_id = sorting_qualitative_value(&node.sorting_values, SortingKind::Preservation)
        .or_else(|| options.default_preservation_id(is_discard));

    let (dressing_id, preservation_id) = match (dressing_id, preservation_id) {
        (Some(d), Some(p)) => (d, p),
        _ => return Ok(None),
    };

    let conversion = conversions.find_round_weight_conversion(&RoundWeightFilter {
        taxon_group_id,
        dressing_id,
        preservation_id,
        country_location_id,
        date: options.date,
    })?;
    Ok(conversion.map(|c| c.conversion_coefficient))
}

fn sorting_qualitative_value(
    sorting_values: &[fdp_common::batch::SortingValue],
    kind: SortingKind,
) -> Option<i32> {
    sorting_values
        .iter()
        .find(|sv| sv.kind == kind)
        .and_then(|sv| sv.qualitative_value_id)
}

/// Compute length-derived (RTP) weights on every leaf that carries an
/// individual count, a taxon and a length measurement.
///
/// The formula yields an alive weight; it is converted back to the leaf's
/// dressing/preservation context by dividing by the alive-weight factor.
/// When the leaf already has a recorded weight and the two disagree beyond
/// tolerance, a calculated-from-length weight is silently replaced
/// (self-heal); any other method only logs the mismatch.
pub fn resolve_rtp_weights(
    arena: &mut NodeArena,
    options: &DenormalizationOptions,
    conversions: &dyn ConversionSource,
) -> Result<()> {
    if !options.enable_rtp_weight {
        return Ok(());
    }
    for id in arena.preorder() {
        if arena[id].is_leaf() {
            compute_rtp_weight(arena, id, options, conversions)?;
        }
    }
    Ok(())
}

fn compute_rtp_weight(
    arena: &mut NodeArena,
    id: NodeId,
    options: &DenormalizationOptions,
    conversions: &dyn ConversionSource,
) -> Result<()> {
    let node = &arena[id];

    let individual_count = match node.individual_count {
        Some(n) if n > 0 => n,
        _ => return Ok(()),
    };
    if !node.has_taxon() {
        return Ok(());
    }

    let length = match node
        .sorting_values
        .iter()
        .find(|sv| sv.kind == SortingKind::Length && sv.value.is_some())
    {
        Some(sv) => sv.clone(),
        None => return Ok(()),
    };
    let sex = Sex::from_qualitative_value(sorting_qualitative_value(
        &node.sorting_values,
        SortingKind::Sex,
    ));

    let filter = WeightLengthFilter {
        taxon_group_id: node.taxon_group(),
        taxon_name_id: node.taxon_name(),
        length_pmfm_id: length.pmfm_id,
        sex,
        location_ids: options.fishing_area_location_ids.clone(),
        month: options.month(),
        year: options.year(),
    };
    let conversion = match conversions.find_weight_length_conversion(&filter)? {
        Some(c) => c,
        None => return Ok(()),
    };

    let alive_kg = conversion.compute_weight(
        length.value.unwrap_or(0.0),
        length.unit.unwrap_or(LengthUnit::Centimeter),
        length.precision,
        individual_count as f64,
    );
    let context_kg = convert_alive_to_context(alive_kg, arena[id].alive_weight_factor);

    arena[id].set_direct_weight(WeightFamily::LengthDerived, context_kg);

    // compare with the recorded weight, when there is one
    if let Some(recorded) = arena[id].weight {
        if recorded > 0.0 {
            let diff_pct = ((context_kg - recorded).abs() / recorded) * 100.0;
            if diff_pct > options.max_weight_diff_pct {
                let calculated = arena[id]
                    .weight_method
                    .map(|m| m.calculated())
                    .unwrap_or(false);
                if calculated {
                    // the stored weight came from an older length
                    // conversion; adopt the recomputed value
                    tracing::warn!(
                        batch_id = arena[id].id,
                        label = %arena[id].label,
                        recorded,
                        recomputed = context_kg,
                        "Correcting stale length-derived weight"
                    );
                    arena[id].weight = Some(context_kg);
                    arena[id].set_direct_weight(WeightFamily::AsRecorded, context_kg);
                } else {
                    tracing::warn!(
                        batch_id = arena[id].id,
                        label = %arena[id].label,
                        recorded,
                        recomputed = context_kg,
                        diff_pct,
                        "Recorded weight disagrees with length-derived weight"
                    );
                }
            }
        }
    }
    Ok(())
}

/// Inverse round-weight conversion: alive → dressing/preservation context
pub fn convert_alive_to_context(alive_kg: f64, alive_factor: Option<f64>) -> f64 {
    match alive_factor {
        Some(factor) if factor > 0.0 && factor != 1.0 => round_weight(alive_kg / factor),
        _ => alive_kg,
    }
}
