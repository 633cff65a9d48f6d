//! Context inheritance (top-down pass)
//!
//! Propagates taxon, location, landing/discard, exhaustive-inventory,
//! quality flag and sorting measurements down the tree. Runs once per
//! tree, before sampling resolution; parents are always resolved before
//! their children (arena pre-order).

use crate::arena::{NodeArena, NodeId};
use crate::options::DenormalizationOptions;

use fdp_common::referential::QualityFlag;

/// Resolve inherited context for every node
pub fn resolve(arena: &mut NodeArena, options: &DenormalizationOptions) {
    for id in arena.preorder() {
        match arena[id].parent {
            None => resolve_root(arena, id, options),
            Some(parent) => resolve_child(arena, id, parent, options),
        }
    }
}

fn resolve_root(arena: &mut NodeArena, id: NodeId, options: &DenormalizationOptions) {
    let node = &mut arena[id];
    node.tree_level = 1;
    node.is_landing = Some(node.is_landing.unwrap_or(false));
    node.is_discard = Some(node.is_discard.unwrap_or(false));
    node.exhaustive_inventory = resolve_exhaustive(node.exhaustive_input, node.taxon_name_id, node.taxon_group_id, options)
        // root has nothing to inherit from; default true
        .unwrap_or(true);

    // an invalid flag suppresses weight summation on the root too
    if node.quality_flag.map(|f| f.is_invalid()).unwrap_or(false) {
        node.exhaustive_inventory = false;
    }
}

fn resolve_child(
    arena: &mut NodeArena,
    id: NodeId,
    parent: NodeId,
    options: &DenormalizationOptions,
) {
    // snapshot the parent context before mutating the child
    let parent_level = arena[parent].tree_level;
    let parent_taxon_group = arena[parent].taxon_group();
    let parent_taxon_name = arena[parent].taxon_name();
    let parent_location = arena[parent].location_id;
    let parent_landing = arena[parent].is_landing;
    let parent_discard = arena[parent].is_discard;
    let parent_exhaustive = arena[parent].exhaustive_inventory;
    let parent_flag = arena[parent].quality_flag;
    let parent_sorting: Vec<_> = arena[parent].sorting_values.clone();

    let node = &mut arena[id];
    node.tree_level = parent_level + 1;

    // inherit taxon only when the node lacks its own
    if node.taxon_group_id.is_none() {
        node.inherited_taxon_group_id = parent_taxon_group;
    }
    if node.taxon_name_id.is_none() {
        node.inherited_taxon_name_id = parent_taxon_name;
    }

    if node.location_id.is_none() {
        node.location_id = parent_location;
    }
    if node.is_landing.is_none() {
        node.is_landing = parent_landing;
    }
    if node.is_discard.is_none() {
        node.is_discard = parent_discard;
    }

    node.exhaustive_inventory =
        resolve_exhaustive(node.exhaustive_input, node.taxon_name_id, node.taxon_group_id, options)
            .unwrap_or(parent_exhaustive);

    // worst of own and parent flags
    let resolved_flag = match (node.quality_flag, parent_flag) {
        (Some(own), Some(inherited)) => Some(QualityFlag::worst(own, inherited)),
        (own, inherited) => own.or(inherited),
    };
    node.quality_flag = resolved_flag;

    // copy down parent measurements the node does not carry itself,
    // rank order divided by 10 so they sort after the node's own
    let own_parameters: Vec<i32> = node.sorting_values.iter().map(|sv| sv.parameter_id).collect();
    for sv in parent_sorting {
        if !own_parameters.contains(&sv.parameter_id) {
            let mut inherited = sv;
            inherited.is_inherited = true;
            inherited.rank_order /= 10.0;
            node.sorting_values.push(inherited);
        }
    }

    // an invalid resolved flag suppresses weight summation on this branch:
    // the node and its immediate parent both lose exhaustive inventory
    if resolved_flag.map(|f| f.is_invalid()).unwrap_or(false) {
        arena[id].exhaustive_inventory = false;
        arena[parent].exhaustive_inventory = false;
    }
}

/// Exhaustive inventory, when decidable from the node alone: the recorded
/// flag wins; else a taxon name implies exhaustive, as does a taxon group
/// when taxon-name tracking is disabled
fn resolve_exhaustive(
    recorded: Option<bool>,
    taxon_name_id: Option<i32>,
    taxon_group_id: Option<i32>,
    options: &DenormalizationOptions,
) -> Option<bool> {
    if recorded.is_some() {
        return recorded;
    }
    if taxon_name_id.is_some() {
        return Some(true);
    }
    if taxon_group_id.is_some() && !options.enable_taxon_name {
        return Some(true);
    }
    None
}
