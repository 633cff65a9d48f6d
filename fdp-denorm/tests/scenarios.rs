//! End-to-end denormalization scenarios
//!
//! Each test drives the engine through the public API, the way the job
//! driver does, and checks the flat result.

use std::sync::Arc;

use fdp_common::batch::{BatchNode, SortingValue};
use fdp_common::referential::{LengthUnit, SortingKind, WeightMethod};
use fdp_common::{Error, Result};
use fdp_denorm::conversion::{
    ConversionSource, NoConversions, RoundWeightConversion, RoundWeightFilter,
    WeightLengthConversion, WeightLengthFilter,
};
use fdp_denorm::{DenormalizationEngine, DenormalizationOptions};

fn engine() -> DenormalizationEngine {
    DenormalizationEngine::new(Arc::new(NoConversions))
}

#[test]
fn scenario_trivial_single_node() {
    let mut root = BatchNode::new(1, "CATCH_BATCH#1");
    root.weight = Some(12.5);

    let flat = engine()
        .denormalize(&root, &DenormalizationOptions::default())
        .unwrap();

    assert_eq!(flat.len(), 1);
    assert_eq!(flat[0].final_elevate_weight(), Some(12.5));
}

#[test]
fn scenario_sampling_elevation() {
    // root(exhaustive, 10 kg) -> species batch(2 kg) -> leaf(40 individuals)
    let mut root = BatchNode::new(1, "CATCH_BATCH#1");
    root.exhaustive_inventory = Some(true);
    root.weight = Some(10.0);
    let mut species = BatchNode::new(2, "SPECIES#1");
    species.taxon_name_id = Some(300);
    species.weight = Some(2.0);
    let mut leaf = BatchNode::new(3, "SPECIES#1.1");
    leaf.individual_count = Some(40);
    species.children.push(leaf);
    root.children.push(species);

    let flat = engine()
        .denormalize(&root, &DenormalizationOptions::default())
        .unwrap();

    let species_out = flat.iter().find(|b| b.id == 2).unwrap();
    assert_eq!(species_out.sampling_ratio, Some(0.2));
    assert_eq!(species_out.sampling_factor, Some(5.0));

    let leaf_out = flat.iter().find(|b| b.id == 3).unwrap();
    assert_eq!(leaf_out.elevate_individual_count, Some(200));
}

#[test]
fn scenario_sampled_weight_above_parent_is_fatal() {
    let mut root = BatchNode::new(1, "CATCH_BATCH#1");
    root.exhaustive_inventory = Some(true);
    root.weight = Some(2.0);
    let mut child = BatchNode::new(2, "SPECIES#1");
    child.weight = Some(3.0);
    root.children.push(child);

    // force never suppresses data validation failures
    let options = DenormalizationOptions {
        force: true,
        ..Default::default()
    };
    let err = engine().denormalize(&root, &options).unwrap_err();
    match err {
        Error::InvalidSamplingBatch { id, label, .. } => {
            assert_eq!(id, 2);
            assert_eq!(label, "SPECIES#1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Weight-length source for the RTP scenario: one cubic formula, no
/// round-weight coefficients
struct CubicFormula;

impl ConversionSource for CubicFormula {
    fn find_weight_length_conversion(
        &self,
        _filter: &WeightLengthFilter,
    ) -> Result<Option<WeightLengthConversion>> {
        // 10 cm -> 1300 g
        Ok(Some(WeightLengthConversion {
            coefficient_a: 1.3,
            exponent_b: 3.0,
        }))
    }

    fn find_round_weight_conversion(
        &self,
        _filter: &RoundWeightFilter,
    ) -> Result<Option<RoundWeightConversion>> {
        Ok(None)
    }
}

#[test]
fn scenario_rtp_mismatch_self_heals() {
    let mut leaf = BatchNode::new(1, "SPECIES#1.1");
    leaf.taxon_group_id = Some(30);
    leaf.individual_count = Some(1);
    leaf.weight = Some(1.0);
    leaf.weight_method = Some(WeightMethod::CalculatedFromLength);
    leaf.sorting_values.push(SortingValue {
        pmfm_id: 10,
        parameter_id: 10,
        kind: SortingKind::Length,
        value: Some(10.0),
        qualitative_value_id: None,
        unit: Some(LengthUnit::Centimeter),
        precision: None,
        rank_order: 1.0,
        is_inherited: false,
    });

    let options = DenormalizationOptions {
        enable_rtp_weight: true,
        round_weight_country_location_id: Some(99),
        fishing_area_location_ids: vec![101],
        max_weight_diff_pct: 10.0,
        ..Default::default()
    };
    let flat = DenormalizationEngine::new(Arc::new(CubicFormula))
        .denormalize(&leaf, &options)
        .unwrap();

    // 1.3 kg recomputed vs 1.0 kg recorded: beyond 10%, and the stored
    // weight was itself length-derived, so it is replaced
    assert_eq!(flat[0].rtp_weight, Some(1.3));
    assert_eq!(flat[0].weight, Some(1.3));
    assert_eq!(flat[0].final_elevate_weight(), Some(1.3));
}

#[test]
fn scenario_rtp_mismatch_on_measured_weight_keeps_it() {
    let mut leaf = BatchNode::new(1, "SPECIES#1.1");
    leaf.taxon_group_id = Some(30);
    leaf.individual_count = Some(1);
    leaf.weight = Some(1.0);
    leaf.weight_method = Some(WeightMethod::Measured);
    leaf.sorting_values.push(SortingValue {
        pmfm_id: 10,
        parameter_id: 10,
        kind: SortingKind::Length,
        value: Some(10.0),
        qualitative_value_id: None,
        unit: Some(LengthUnit::Centimeter),
        precision: None,
        rank_order: 1.0,
        is_inherited: false,
    });

    let options = DenormalizationOptions {
        enable_rtp_weight: true,
        round_weight_country_location_id: Some(99),
        fishing_area_location_ids: vec![101],
        max_weight_diff_pct: 10.0,
        ..Default::default()
    };
    let flat = DenormalizationEngine::new(Arc::new(CubicFormula))
        .denormalize(&leaf, &options)
        .unwrap();

    // mismatch is logged only; a measured weight is never altered
    assert_eq!(flat[0].rtp_weight, Some(1.3));
    assert_eq!(flat[0].weight, Some(1.0));
}

#[test]
fn scenario_weightless_sampling_batch_recovers_and_elevates() {
    // root(exhaustive, 10 kg) -> sampling(ratio 1/4, no weight,
    // 40 individuals): the sample's own weight is recovered as its
    // fraction of the parent (2.5 kg) and its elevated weight is the
    // full total, consistent with the elevated count
    let mut root = BatchNode::new(1, "CATCH_BATCH#1");
    root.exhaustive_inventory = Some(true);
    root.weight = Some(10.0);
    let mut sampling = BatchNode::new(2, "SORTING#1.%");
    sampling.sampling_ratio = Some(0.25);
    sampling.individual_count = Some(40);
    root.children.push(sampling);

    let flat = engine()
        .denormalize(&root, &DenormalizationOptions::default())
        .unwrap();

    let sampling_out = flat.iter().find(|b| b.id == 2).unwrap();
    assert_eq!(sampling_out.indirect_weight, Some(2.5));
    assert_eq!(sampling_out.elevate_context_factor, Some(4.0));
    assert_eq!(sampling_out.final_elevate_weight(), Some(10.0));
    assert_eq!(sampling_out.elevate_individual_count, Some(160));
}

fn weightless_chain() -> BatchNode {
    // root(8 kg) -> S1(ratio 1/2, no weight) -> S2(ratio 1/2, no weight)
    //            -> leaf(10 individuals)
    let mut root = BatchNode::new(1, "CATCH_BATCH#1");
    root.weight = Some(8.0);
    let mut s1 = BatchNode::new(2, "SORTING#1.%");
    s1.sampling_ratio = Some(0.5);
    let mut s2 = BatchNode::new(3, "SORTING#1.%.%");
    s2.sampling_ratio = Some(0.5);
    let mut leaf = BatchNode::new(4, "SORTING#1.%.%.1");
    leaf.individual_count = Some(10);
    s2.children.push(leaf);
    s1.children.push(s2);
    root.children.push(s1);
    root
}

#[test]
fn scenario_weightless_chain_elevates_every_level_to_the_total() {
    // each level recovers the fraction it physically holds, and every
    // level's elevated weight is the full 8 kg (the ratio cancels against
    // the accumulated factor)
    let flat = engine()
        .denormalize(&weightless_chain(), &DenormalizationOptions::default())
        .unwrap();

    let s1_out = flat.iter().find(|b| b.id == 2).unwrap();
    assert_eq!(s1_out.indirect_weight, Some(4.0));
    assert_eq!(s1_out.final_elevate_weight(), Some(8.0));
    let s2_out = flat.iter().find(|b| b.id == 3).unwrap();
    assert_eq!(s2_out.indirect_weight, Some(2.0));
    assert_eq!(s2_out.final_elevate_weight(), Some(8.0));

    let leaf_out = flat.iter().find(|b| b.id == 4).unwrap();
    assert_eq!(leaf_out.elevate_context_factor, Some(4.0));
    assert_eq!(leaf_out.elevate_individual_count, Some(40));
}

#[test]
fn scenario_weightless_chain_is_insensitive_to_the_pass_cap() {
    // chains resolve during the pre-order recovery sweep, before the
    // capped gap-fill loop; a cap of one pass must not lose values
    let options = DenormalizationOptions {
        max_elevation_passes: 1,
        ..Default::default()
    };
    let flat = engine().denormalize(&weightless_chain(), &options).unwrap();

    assert_eq!(
        flat.iter().find(|b| b.id == 2).unwrap().final_elevate_weight(),
        Some(8.0)
    );
    assert_eq!(
        flat.iter().find(|b| b.id == 3).unwrap().final_elevate_weight(),
        Some(8.0)
    );
}
