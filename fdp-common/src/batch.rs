//! Batch tree input model
//!
//! A catch batch is the hierarchical record of what was caught or sampled
//! on one fishing or sale event. The persistence layer loads one tree per
//! operation or sale (children and measurements pre-loaded) and hands it to
//! the denormalization engine, which owns it for the duration of one call.

use serde::{Deserialize, Serialize};

use crate::referential::{LengthUnit, QualityFlag, SortingKind, WeightMethod};

/// One sorting measurement attached to a batch node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortingValue {
    /// Pmfm (parameter/matrix/fraction/method) id of the measurement
    pub pmfm_id: i32,

    /// Parameter id; inheritance copies a parent measurement down only
    /// when the child has no measurement for the same parameter
    pub parameter_id: i32,

    /// Classification done by the tree loader (the core never resolves
    /// pmfm referential records itself)
    pub kind: SortingKind,

    /// Numeric value, when the measurement is quantitative
    #[serde(default)]
    pub value: Option<f64>,

    /// Qualitative value id (dressing, preservation, sex, ...)
    #[serde(default)]
    pub qualitative_value_id: Option<i32>,

    /// Unit of a length measurement
    #[serde(default)]
    pub unit: Option<LengthUnit>,

    /// Measurement precision (length class width)
    #[serde(default)]
    pub precision: Option<f64>,

    /// Display rank; inherited copies get their parent rank divided by 10
    /// so they sort after the node's own measurements
    #[serde(default)]
    pub rank_order: f64,

    /// True when copied down from an ancestor during inheritance
    #[serde(default)]
    pub is_inherited: bool,
}

/// One node of a catch batch tree (engine input).
///
/// The node exclusively owns its children for the lifetime of one
/// denormalization call; the whole tree is moved into the engine and
/// discarded once the flat list is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNode {
    pub id: i64,
    pub label: String,

    /// Sibling rank among the parent's children
    #[serde(default)]
    pub rank_order: Option<i32>,

    /// Recorded weight, kg
    #[serde(default)]
    pub weight: Option<f64>,

    /// How the recorded weight was obtained
    #[serde(default)]
    pub weight_method: Option<WeightMethod>,

    #[serde(default)]
    pub individual_count: Option<i64>,

    /// Explicit sampling ratio (fraction of the parent physically sampled)
    #[serde(default)]
    pub sampling_ratio: Option<f64>,

    /// Free-text form of the ratio, usually "a/b"; re-parsed for extra
    /// precision over the stored float
    #[serde(default)]
    pub sampling_ratio_text: Option<String>,

    /// Whether this node's children account for 100% of it
    #[serde(default)]
    pub exhaustive_inventory: Option<bool>,

    #[serde(default)]
    pub taxon_group_id: Option<i32>,

    #[serde(default)]
    pub taxon_name_id: Option<i32>,

    #[serde(default)]
    pub is_landing: Option<bool>,

    #[serde(default)]
    pub is_discard: Option<bool>,

    #[serde(default)]
    pub location_id: Option<i32>,

    #[serde(default)]
    pub quality_flag: Option<QualityFlag>,

    #[serde(default)]
    pub sorting_values: Vec<SortingValue>,

    #[serde(default)]
    pub children: Vec<BatchNode>,
}

impl BatchNode {
    /// Minimal node for tests and builders
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            rank_order: None,
            weight: None,
            weight_method: None,
            individual_count: None,
            sampling_ratio: None,
            sampling_ratio_text: None,
            exhaustive_inventory: None,
            taxon_group_id: None,
            taxon_name_id: None,
            is_landing: None,
            is_discard: None,
            location_id: None,
            quality_flag: None,
            sorting_values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in the tree rooted here
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(BatchNode::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_counts_whole_tree() {
        let mut root = BatchNode::new(1, "CATCH_BATCH#1");
        let mut child = BatchNode::new(2, "SORTING_BATCH#1");
        child.children.push(BatchNode::new(3, "SORTING_BATCH#1.1"));
        root.children.push(child);
        root.children.push(BatchNode::new(4, "SORTING_BATCH#2"));
        assert_eq!(root.count(), 4);
    }

    #[test]
    fn test_json_round_trip_with_defaults() {
        let json = r#"{
            "id": 10,
            "label": "CATCH_BATCH#10",
            "weight": 12.5,
            "exhaustive_inventory": true,
            "children": [
                { "id": 11, "label": "SORTING_BATCH#10.1", "sampling_ratio_text": "2/10" }
            ]
        }"#;
        let node: BatchNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, 10);
        assert_eq!(node.weight, Some(12.5));
        assert_eq!(node.children.len(), 1);
        assert_eq!(
            node.children[0].sampling_ratio_text.as_deref(),
            Some("2/10")
        );
        assert!(node.children[0].sorting_values.is_empty());

        let back = serde_json::to_string(&node).unwrap();
        let reparsed: BatchNode = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed.count(), 2);
    }
}
