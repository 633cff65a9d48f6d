//! Denormalized batch output model
//!
//! One flat record per tree node, carrying the node's own fields plus every
//! inherited, indirect and elevated value the engine resolved. The list is
//! what the caller persists (full replace per operation or sale).

use serde::{Deserialize, Serialize};

use crate::batch::SortingValue;
use crate::referential::{QualityFlag, WeightMethod};

/// One flat denormalized record (engine output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenormalizedBatch {
    pub id: i64,
    pub label: String,
    pub rank_order: Option<i32>,

    /// Depth in the tree, root = 1
    pub tree_level: u32,

    /// Position in the flat pre-order permutation, starting at 1;
    /// every ancestor's rank is lower than every descendant's
    pub flat_rank_order: u32,

    /// Display indent for log dumps (not a stable interchange format)
    pub tree_indent: String,

    pub is_landing: bool,
    pub is_discard: bool,
    pub location_id: Option<i32>,
    pub quality_flag: Option<QualityFlag>,

    pub taxon_group_id: Option<i32>,
    pub taxon_name_id: Option<i32>,
    pub inherited_taxon_group_id: Option<i32>,
    pub inherited_taxon_name_id: Option<i32>,

    /// Resolved flag: children account for 100% of this node
    pub exhaustive_inventory: bool,

    pub sampling_ratio: Option<f64>,
    pub sampling_ratio_text: Option<String>,
    /// Inverse of the sampling ratio (0 when the ratio is 0)
    pub sampling_factor: Option<f64>,

    // -- the four weight families, direct and indirect (kg) --
    /// As-recorded weight
    pub weight: Option<f64>,
    pub weight_method: Option<WeightMethod>,
    /// As-recorded weight inferred bottom-up
    pub indirect_weight: Option<f64>,
    /// Length-derived (RTP) weight
    pub rtp_weight: Option<f64>,
    pub indirect_rtp_weight: Option<f64>,
    /// Elevated (extrapolated-to-total) weight
    pub elevate_weight: Option<f64>,
    pub indirect_elevate_weight: Option<f64>,
    /// Elevated length-derived weight
    pub elevate_rtp_weight: Option<f64>,
    pub indirect_elevate_rtp_weight: Option<f64>,

    /// Round-weight coefficient converting this node's dressing and
    /// preservation context to alive ("whole, fresh") equivalent
    pub alive_weight_factor: Option<f64>,

    // -- elevation factors --
    /// Product of sampling factors from the root down to this node
    pub elevate_context_factor: Option<f64>,
    /// Same recursion, restarted at the first taxon-bearing ancestor
    pub taxon_elevate_factor: Option<f64>,
    /// Context factor combined with the alive-weight factor
    pub elevate_factor: Option<f64>,

    /// Context-factor-only elevated weight (no alive conversion)
    pub elevate_context_weight: Option<f64>,
    pub taxon_elevate_weight: Option<f64>,

    pub individual_count: Option<i64>,
    pub elevate_context_individual_count: Option<i64>,
    pub taxon_elevate_individual_count: Option<i64>,
    pub elevate_individual_count: Option<i64>,

    /// Own sorting measurements plus inherited copies
    pub sorting_values: Vec<SortingValue>,
}

impl DenormalizedBatch {
    /// Final elevated weight: the factor-applied value when the node had a
    /// usable context weight, else the bottom-up gap-filled value
    pub fn final_elevate_weight(&self) -> Option<f64> {
        self.elevate_weight.or(self.indirect_elevate_weight)
    }
}
