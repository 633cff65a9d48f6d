//! Sampling ratio and factor resolution (top-down pass)
//!
//! Every non-root node gets a sampling ratio r and its inverse factor
//! f = 1/r (f = 0 when r = 0 by convention). Ratios come from, in order:
//! the recorded ratio (re-parsed from its "a/b" text when present, for
//! extra precision), the node/parent weight quotient under an exhaustive
//! parent, a children-sum standing in for a missing node weight, or a
//! default of 1 for plain sorting nodes. A sampling fraction that cannot
//! be explained at all is a fatal data error for the tree.

use crate::arena::{NodeArena, NodeId, RatioSource, WeightFamily};
use crate::options::DenormalizationOptions;
use crate::weight;

use fdp_common::rounding::{approx_eq, EPSILON};
use fdp_common::{Error, Result};

/// Resolve ratio and factor for every non-root node
pub fn resolve(arena: &mut NodeArena, options: &DenormalizationOptions) -> Result<()> {
    for id in arena.preorder() {
        if let Some(parent) = arena[id].parent {
            resolve_node(arena, id, parent, options)?;
        }
    }
    Ok(())
}

fn resolve_node(
    arena: &mut NodeArena,
    id: NodeId,
    parent: NodeId,
    options: &DenormalizationOptions,
) -> Result<()> {
    // rule 1: an explicit ratio on the node
    if let Some(recorded) = arena[id].sampling_ratio_input {
        let (ratio, factor, source) = match parse_ratio_text(arena[id].sampling_ratio_text.as_deref())
        {
            // the "a/b" text carries more precision than the stored float
            Some((a, b)) => {
                recover_implied_weights(arena, id, parent, a, b);
                (a / b, invert(a / b), RatioSource::Text)
            }
            None => (recorded, invert(recorded), RatioSource::Explicit),
        };
        set_ratio(arena, id, ratio, factor, source);
        return Ok(());
    }

    let parent_exhaustive = arena[parent].exhaustive_inventory;
    let parent_weight = arena[parent].context_weight(WeightFamily::AsRecorded);
    let node_weight = arena[id].weight;
    let has_children = !arena[id].children.is_empty();

    // rule 2: both weights known under an exhaustive parent
    if parent_exhaustive && parent_weight.is_some() && node_weight.is_some() {
        let (pw, nw) = (parent_weight.unwrap_or(0.0), node_weight.unwrap_or(0.0));
        derive_from_weights(arena, id, nw, pw)?;
        return Ok(());
    }

    // rule 3: children sum stands in for the missing node weight
    if parent_exhaustive && parent_weight.is_some() && has_children {
        if let Some(sum) =
            weight::resolve_indirect_weight(arena, id, WeightFamily::AsRecorded, false, options)
        {
            derive_from_weights(arena, id, sum, parent_weight.unwrap_or(0.0))?;
            return Ok(());
        }
    }

    // rule 4: under a non-exhaustive parent a subtree is taken as-is
    if !parent_exhaustive && has_children {
        set_ratio(arena, id, 1.0, 1.0, RatioSource::Default);
        return Ok(());
    }

    // rule 5: plain leaf
    if !has_children {
        set_ratio(arena, id, 1.0, 1.0, RatioSource::Default);
        return Ok(());
    }

    // rule 6: a sampling fraction nothing can explain
    Err(Error::InvalidSamplingBatch {
        id: arena[id].id,
        label: arena[id].label.clone(),
        reason: "sampling ratio cannot be resolved or inferred".into(),
    })
}

/// Ratio and factor from node/parent weights; a sampled weight above the
/// exhaustive parent weight is a fatal data error
fn derive_from_weights(arena: &mut NodeArena, id: NodeId, node_kg: f64, parent_kg: f64) -> Result<()> {
    if node_kg > parent_kg + EPSILON {
        return Err(Error::InvalidSamplingBatch {
            id: arena[id].id,
            label: arena[id].label.clone(),
            reason: format!(
                "sampled weight {} kg exceeds exhaustive parent weight {} kg",
                node_kg, parent_kg
            ),
        });
    }
    if parent_kg <= 0.0 {
        set_ratio(arena, id, 0.0, 0.0, RatioSource::WeightDerived);
        return Ok(());
    }
    let ratio = node_kg / parent_kg;
    let factor = if node_kg <= 0.0 { 0.0 } else { parent_kg / node_kg };
    set_ratio(arena, id, ratio, factor, RatioSource::WeightDerived);
    Ok(())
}

fn set_ratio(arena: &mut NodeArena, id: NodeId, ratio: f64, factor: f64, source: RatioSource) {
    let node = &mut arena[id];
    node.sampling_ratio = Some(ratio);
    node.sampling_factor = Some(factor);
    node.ratio_source = source;
}

fn invert(ratio: f64) -> f64 {
    if ratio > 0.0 {
        1.0 / ratio
    } else {
        0.0
    }
}

/// Parse a ratio text of the form "a/b"
fn parse_ratio_text(text: Option<&str>) -> Option<(f64, f64)> {
    let text = text?;
    let (a, b) = text.split_once('/')?;
    let a: f64 = a.trim().parse().ok()?;
    let b: f64 = b.trim().parse().ok()?;
    if b <= 0.0 || a < 0.0 {
        return None;
    }
    Some((a, b))
}

/// When the "a/b" numerator matches the node's known weight, `b` is the
/// weight of the sampled parent; adopt it when the parent has none
fn recover_implied_weights(arena: &mut NodeArena, id: NodeId, parent: NodeId, a: f64, b: f64) {
    let node_weight = arena[id].weight;
    if node_weight.map(|w| approx_eq(w, a)).unwrap_or(false)
        && arena[parent].context_weight(WeightFamily::AsRecorded).is_none()
    {
        arena[parent].set_indirect_weight(WeightFamily::AsRecorded, b);
    }
}
