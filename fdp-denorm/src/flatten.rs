//! Flattening: flat rank assignment, tree indents, output records
//!
//! Nodes leave the arena in depth-first pre-order (the flat order fixed at
//! arena build). The indent string is display-only, used by the ASCII dump
//! in logs; it is not a stable interchange format.

use crate::arena::{NodeArena, NodeId, WeightFamily};

use fdp_common::DenormalizedBatch;

/// Assign flat rank order and tree indents, then emit the flat list
pub fn emit(mut arena: NodeArena) -> Vec<DenormalizedBatch> {
    let root = arena.root();
    arena[root].tree_indent = "-".to_string();
    assign_indents(&mut arena, root, "");

    for (position, id) in arena.preorder().into_iter().enumerate() {
        arena[id].flat_rank_order = position as u32 + 1;
    }

    arena.into_nodes().into_iter().map(to_output).collect()
}

fn assign_indents(arena: &mut NodeArena, id: NodeId, prefix: &str) {
    let children = arena.children_of(id);
    let count = children.len();
    for (index, child) in children.into_iter().enumerate() {
        let last = index + 1 == count;
        arena[child].tree_indent = format!("{}{}", prefix, if last { "|_" } else { "|-" });
        let child_prefix = format!("{}{}", prefix, if last { "  " } else { "|  " });
        assign_indents(arena, child, &child_prefix);
    }
}

fn to_output(node: crate::arena::WorkingNode) -> DenormalizedBatch {
    let indirect_weight = node.indirect_weight(WeightFamily::AsRecorded);
    let rtp_weight = node.direct_weight(WeightFamily::LengthDerived);
    let indirect_rtp_weight = node.indirect_weight(WeightFamily::LengthDerived);
    let elevate_weight = node.direct_weight(WeightFamily::Elevated);
    let indirect_elevate_weight = node.indirect_weight(WeightFamily::Elevated);
    let elevate_rtp_weight = node.direct_weight(WeightFamily::ElevatedLengthDerived);
    let indirect_elevate_rtp_weight = node.indirect_weight(WeightFamily::ElevatedLengthDerived);
    DenormalizedBatch {
        id: node.id,
        label: node.label,
        rank_order: node.rank_order,
        tree_level: node.tree_level,
        flat_rank_order: node.flat_rank_order,
        tree_indent: node.tree_indent,
        is_landing: node.is_landing.unwrap_or(false),
        is_discard: node.is_discard.unwrap_or(false),
        location_id: node.location_id,
        quality_flag: node.quality_flag,
        taxon_group_id: node.taxon_group_id,
        taxon_name_id: node.taxon_name_id,
        inherited_taxon_group_id: node.inherited_taxon_group_id,
        inherited_taxon_name_id: node.inherited_taxon_name_id,
        exhaustive_inventory: node.exhaustive_inventory,
        sampling_ratio: node.sampling_ratio,
        sampling_ratio_text: node.sampling_ratio_text,
        sampling_factor: node.sampling_factor,
        weight: node.weight,
        weight_method: node.weight_method,
        indirect_weight,
        rtp_weight,
        indirect_rtp_weight,
        elevate_weight,
        indirect_elevate_weight,
        elevate_rtp_weight,
        indirect_elevate_rtp_weight,
        alive_weight_factor: node.alive_weight_factor,
        elevate_context_factor: node.elevate_context_factor,
        taxon_elevate_factor: node.taxon_elevate_factor,
        elevate_factor: node.elevate_factor,
        elevate_context_weight: node.elevate_context_weight,
        taxon_elevate_weight: node.taxon_elevate_weight,
        individual_count: node.individual_count,
        elevate_context_individual_count: node.elevate_context_individual_count,
        taxon_elevate_individual_count: node.taxon_elevate_individual_count,
        elevate_individual_count: node.elevate_individual_count,
        sorting_values: node.sorting_values,
    }
}

/// ASCII indented tree of a flat result, for log dumps
pub fn dump(batches: &[DenormalizedBatch]) -> String {
    let mut out = String::new();
    for batch in batches {
        out.push_str(&format!(
            "{} {} (id={}, weight={}, ratio={}, elevated={})\n",
            batch.tree_indent,
            batch.label,
            batch.id,
            fmt_opt(batch.weight),
            fmt_opt(batch.sampling_ratio),
            fmt_opt(batch.final_elevate_weight()),
        ));
    }
    out
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v}")).unwrap_or_else(|| "-".into())
}
