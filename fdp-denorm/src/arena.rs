//! Working tree arena
//!
//! The denormalization passes need parent and children links on every node.
//! Instead of a cyclic object graph, nodes live in one flat `Vec` and refer
//! to each other by integer index (`NodeId`). The arena is built fresh from
//! an input `BatchNode` tree per call and discarded once the flat list is
//! emitted.
//!
//! Nodes are inserted in pre-order with siblings sorted by the flat-order
//! key (rank order ascending, leaves before non-leaves on ties), so the
//! insertion order is already the flat traversal order.

use fdp_common::batch::{BatchNode, SortingValue};
use fdp_common::referential::{QualityFlag, WeightMethod};

/// Index of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// The four weight families the generic indirect-weight algorithm is
/// parametrized over. Each selects one direct/indirect cell pair on the
/// working node; dispatch is an array index, checked at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightFamily {
    /// Weight as recorded (or inferred from recorded weights)
    AsRecorded,
    /// Length-derived ("RTP") weight
    LengthDerived,
    /// Elevated (extrapolated-to-total) weight
    Elevated,
    /// Elevated length-derived weight
    ElevatedLengthDerived,
}

impl WeightFamily {
    pub const ALL: [WeightFamily; 4] = [
        WeightFamily::AsRecorded,
        WeightFamily::LengthDerived,
        WeightFamily::Elevated,
        WeightFamily::ElevatedLengthDerived,
    ];

    /// Families that already carry accumulated sampling factors; sampling
    /// recovery adopts values across the parent link instead of scaling
    pub fn is_elevated(self) -> bool {
        matches!(
            self,
            WeightFamily::Elevated | WeightFamily::ElevatedLengthDerived
        )
    }

    fn index(self) -> usize {
        match self {
            WeightFamily::AsRecorded => 0,
            WeightFamily::LengthDerived => 1,
            WeightFamily::Elevated => 2,
            WeightFamily::ElevatedLengthDerived => 3,
        }
    }
}

/// One direct/indirect weight pair (kg)
#[derive(Debug, Clone, Copy, Default)]
pub struct FamilyCell {
    /// Value carried by the node itself (recorded, computed, or
    /// factor-applied depending on the family)
    pub direct: Option<f64>,
    /// Value inferred bottom-up (children sum or sampling recovery)
    pub indirect: Option<f64>,
}

/// How a node's sampling ratio was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioSource {
    /// Explicit ratio recorded on the node
    Explicit,
    /// Re-derived from the "a/b" ratio text
    Text,
    /// Derived from node and exhaustive-parent weights
    WeightDerived,
    /// Defaulted to 1 (node is not a sampling fraction)
    Default,
}

/// One node of the working tree: input fields plus every computed field
#[derive(Debug, Clone)]
pub struct WorkingNode {
    // -- input --
    pub id: i64,
    pub label: String,
    pub rank_order: Option<i32>,
    pub weight: Option<f64>,
    pub weight_method: Option<WeightMethod>,
    pub individual_count: Option<i64>,
    pub sampling_ratio_input: Option<f64>,
    pub sampling_ratio_text: Option<String>,
    pub exhaustive_input: Option<bool>,
    pub taxon_group_id: Option<i32>,
    pub taxon_name_id: Option<i32>,
    pub is_landing: Option<bool>,
    pub is_discard: Option<bool>,
    pub location_id: Option<i32>,
    pub quality_flag: Option<QualityFlag>,
    pub sorting_values: Vec<SortingValue>,

    // -- structure --
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,

    // -- inheritance --
    pub tree_level: u32,
    pub inherited_taxon_group_id: Option<i32>,
    pub inherited_taxon_name_id: Option<i32>,
    pub exhaustive_inventory: bool,

    // -- sampling --
    pub sampling_ratio: Option<f64>,
    pub sampling_factor: Option<f64>,
    pub ratio_source: RatioSource,

    // -- weights --
    pub weights: [FamilyCell; 4],
    pub alive_weight_factor: Option<f64>,

    // -- elevation --
    pub elevate_context_factor: Option<f64>,
    pub taxon_elevate_factor: Option<f64>,
    pub elevate_factor: Option<f64>,
    pub elevate_context_weight: Option<f64>,
    pub taxon_elevate_weight: Option<f64>,
    pub elevate_context_individual_count: Option<i64>,
    pub taxon_elevate_individual_count: Option<i64>,
    pub elevate_individual_count: Option<i64>,

    // -- flatten --
    pub flat_rank_order: u32,
    pub tree_indent: String,
}

impl WorkingNode {
    fn from_input(node: &BatchNode) -> Self {
        Self {
            id: node.id,
            label: node.label.clone(),
            rank_order: node.rank_order,
            weight: node.weight,
            weight_method: node.weight_method,
            individual_count: node.individual_count,
            sampling_ratio_input: node.sampling_ratio,
            sampling_ratio_text: node.sampling_ratio_text.clone(),
            exhaustive_input: node.exhaustive_inventory,
            taxon_group_id: node.taxon_group_id,
            taxon_name_id: node.taxon_name_id,
            is_landing: node.is_landing,
            is_discard: node.is_discard,
            location_id: node.location_id,
            quality_flag: node.quality_flag,
            sorting_values: node.sorting_values.clone(),
            parent: None,
            children: Vec::new(),
            tree_level: 0,
            inherited_taxon_group_id: None,
            inherited_taxon_name_id: None,
            exhaustive_inventory: false,
            sampling_ratio: None,
            sampling_factor: None,
            ratio_source: RatioSource::Default,
            weights: {
                let mut cells = [FamilyCell::default(); 4];
                cells[WeightFamily::AsRecorded.index()].direct = node.weight;
                cells
            },
            alive_weight_factor: None,
            elevate_context_factor: None,
            taxon_elevate_factor: None,
            elevate_factor: None,
            elevate_context_weight: None,
            taxon_elevate_weight: None,
            elevate_context_individual_count: None,
            taxon_elevate_individual_count: None,
            elevate_individual_count: None,
            flat_rank_order: 0,
            tree_indent: String::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Taxon group, own value first then inherited
    pub fn taxon_group(&self) -> Option<i32> {
        self.taxon_group_id.or(self.inherited_taxon_group_id)
    }

    /// Taxon name, own value first then inherited
    pub fn taxon_name(&self) -> Option<i32> {
        self.taxon_name_id.or(self.inherited_taxon_name_id)
    }

    /// True when the node carries a taxon (group or name, own or inherited)
    pub fn has_taxon(&self) -> bool {
        self.taxon_group().is_some() || self.taxon_name().is_some()
    }

    /// Direct value of a weight family
    pub fn direct_weight(&self, family: WeightFamily) -> Option<f64> {
        self.weights[family.index()].direct
    }

    /// Indirect value of a weight family
    pub fn indirect_weight(&self, family: WeightFamily) -> Option<f64> {
        self.weights[family.index()].indirect
    }

    /// Usable context value of a family: direct first, else indirect
    pub fn context_weight(&self, family: WeightFamily) -> Option<f64> {
        self.direct_weight(family).or(self.indirect_weight(family))
    }

    pub fn set_direct_weight(&mut self, family: WeightFamily, value: f64) {
        self.weights[family.index()].direct = Some(value);
    }

    pub fn set_indirect_weight(&mut self, family: WeightFamily, value: f64) {
        self.weights[family.index()].indirect = Some(value);
    }

    /// True when the sampling ratio genuinely relates this node to its
    /// parent (explicit, text or weight-derived, not a defaulted 1)
    pub fn is_sampling_batch(&self) -> bool {
        self.ratio_source != RatioSource::Default && self.sampling_ratio.is_some()
    }
}

/// Arena of working nodes, built per denormalization call
#[derive(Debug)]
pub struct NodeArena {
    nodes: Vec<WorkingNode>,
    root: NodeId,
}

impl NodeArena {
    /// Build the arena from an input tree by pre-order insertion, sorting
    /// siblings once by the flat-order key
    pub fn from_tree(root: &BatchNode) -> Self {
        let mut arena = NodeArena {
            nodes: Vec::with_capacity(root.count()),
            root: NodeId(0),
        };
        arena.insert(root, None);
        arena
    }

    fn insert(&mut self, node: &BatchNode, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut working = WorkingNode::from_input(node);
        working.parent = parent;
        self.nodes.push(working);

        let mut ordered: Vec<&BatchNode> = node.children.iter().collect();
        ordered.sort_by_key(|c| flat_order_key(c));

        for child in ordered {
            let child_id = self.insert(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in flat (pre-order) traversal order. Insertion order is
    /// pre-order with siblings already sorted, so this is just 0..len.
    pub fn preorder(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    /// Child ids of a node, cloned so the caller can mutate the arena
    /// while iterating
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0].children.clone()
    }

    /// Consume the arena, yielding nodes in flat order
    pub fn into_nodes(self) -> Vec<WorkingNode> {
        self.nodes
    }
}

impl std::ops::Index<NodeId> for NodeArena {
    type Output = WorkingNode;

    fn index(&self, id: NodeId) -> &WorkingNode {
        &self.nodes[id.0]
    }
}

impl std::ops::IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut WorkingNode {
        &mut self.nodes[id.0]
    }
}

/// Sibling ordering for the flat traversal: rank order ascending, leaves
/// before non-leaves on ties
fn flat_order_key(node: &BatchNode) -> (i32, bool) {
    (node.rank_order.unwrap_or(i32::MAX), !node.children.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> BatchNode {
        let mut root = BatchNode::new(1, "CATCH_BATCH#1");
        let mut a = BatchNode::new(2, "SORTING_BATCH#1");
        a.rank_order = Some(2);
        a.children.push(BatchNode::new(3, "SORTING_BATCH#1.1"));
        let mut b = BatchNode::new(4, "SORTING_BATCH#2");
        b.rank_order = Some(1);
        root.children.push(a);
        root.children.push(b);
        root
    }

    #[test]
    fn test_preorder_parent_before_descendants() {
        let arena = NodeArena::from_tree(&sample_tree());
        assert_eq!(arena.len(), 4);
        for id in arena.preorder() {
            if let Some(parent) = arena[id].parent {
                assert!(parent.0 < id.0, "parent must precede its children");
            }
        }
    }

    #[test]
    fn test_siblings_sorted_by_rank_order() {
        let arena = NodeArena::from_tree(&sample_tree());
        let children = arena.children_of(arena.root());
        // rank 1 (id 4) before rank 2 (id 2)
        assert_eq!(arena[children[0]].id, 4);
        assert_eq!(arena[children[1]].id, 2);
    }

    #[test]
    fn test_leaf_before_non_leaf_on_rank_tie() {
        let mut root = BatchNode::new(1, "CATCH_BATCH#1");
        let mut branch = BatchNode::new(2, "SORTING_BATCH#1");
        branch.children.push(BatchNode::new(3, "SORTING_BATCH#1.1"));
        let leaf = BatchNode::new(4, "SORTING_BATCH#2");
        root.children.push(branch);
        root.children.push(leaf);

        let arena = NodeArena::from_tree(&root);
        let children = arena.children_of(arena.root());
        assert_eq!(arena[children[0]].id, 4, "leaf sorts before non-leaf");
        assert_eq!(arena[children[1]].id, 2);
    }

    #[test]
    fn test_family_cells_seeded_from_recorded_weight() {
        let mut root = BatchNode::new(1, "CATCH_BATCH#1");
        root.weight = Some(12.5);
        let arena = NodeArena::from_tree(&root);
        let node = &arena[arena.root()];
        assert_eq!(node.direct_weight(WeightFamily::AsRecorded), Some(12.5));
        assert_eq!(node.direct_weight(WeightFamily::LengthDerived), None);
        assert_eq!(node.context_weight(WeightFamily::AsRecorded), Some(12.5));
    }
}
