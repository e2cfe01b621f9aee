//! Branch Prediction Structure Tests.
//!
//! Covers the BTAC (LRU-ordered target cache searched by fetch window) and the
//! saturating-counter direction predictors: none, bimodal and gshare.

use nebula_core::config::{BranchPredictorConfig, PredictorType};
use nebula_core::core::units::bru::{Btac, BtacEntry, CounterTable, SaturatingCounter};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn predictor(kind: PredictorType) -> CounterTable {
    CounterTable::new(&BranchPredictorConfig {
        predictor_type: kind,
        predictor_entries: 16,
        counter_bits: 2,
        ..BranchPredictorConfig::default()
    })
}

// ══════════════════════════════════════════════════════════
// 1. Saturating Counters
// ══════════════════════════════════════════════════════════

#[test]
fn counter_sticks_at_both_ends() {
    let mut c = SaturatingCounter::new(2, 0);
    c.decrement();
    assert_eq!(c.value(), 0, "no wrap below zero");
    for _ in 0..10 {
        c.increment();
    }
    assert_eq!(c.value(), 3, "2-bit counter tops out at 3");
}

#[rstest]
#[case(0, false)]
#[case(1, false)]
#[case(2, true)]
#[case(3, true)]
fn two_bit_counter_predicts_from_its_top_bit(#[case] value: u32, #[case] taken: bool) {
    assert_eq!(SaturatingCounter::new(2, value).taken(), taken);
}

#[test]
fn weakly_not_taken_flips_after_one_taken_outcome() {
    let mut c = SaturatingCounter::weakly_not_taken(2);
    assert!(!c.taken());
    c.update(true);
    assert!(c.taken());
    c.update(false);
    assert!(!c.taken());
}

// ══════════════════════════════════════════════════════════
// 2. Direction Predictors
// ══════════════════════════════════════════════════════════

#[test]
fn without_a_direction_predictor_every_btac_hit_is_taken() {
    let mut table = predictor(PredictorType::None);
    table.train(0x1000, false);
    assert!(table.predict(0x1000));
    assert!(table.counter(0x1000).is_none());
}

#[test]
fn bimodal_learns_per_branch() {
    let mut table = predictor(PredictorType::Bimodal);
    assert!(!table.predict(0x1000), "counters start weakly not taken");
    table.train(0x1000, true);
    table.train(0x1000, true);
    assert!(table.predict(0x1000));
    assert!(!table.predict(0x1004), "a different index is unaffected");
}

#[test]
fn gshare_index_depends_on_history() {
    let mut bimodal = predictor(PredictorType::Bimodal);
    let mut gshare = predictor(PredictorType::Gshare);
    for table in [&mut bimodal, &mut gshare] {
        table.train(0x1000, true);
    }
    assert!(bimodal.predict(0x1000), "bimodal reuses the trained counter");
    assert!(
        !gshare.predict(0x1000),
        "the taken outcome entered the history, so gshare indexes a fresh counter"
    );
}

// ══════════════════════════════════════════════════════════
// 3. BTAC
// ══════════════════════════════════════════════════════════

#[test]
fn btac_lookup_finds_the_first_branch_in_a_window() {
    let mut btac = Btac::new(4);
    btac.update(0x1008, 0x2000, 4);
    btac.update(0x1004, 0x3000, 4);
    btac.update(0x1020, 0x4000, 4);

    let hit = btac.lookup_window(0x1000, 0x1010).unwrap();
    assert_eq!(
        hit,
        BtacEntry {
            branchpc: 0x1004,
            targetpc: 0x3000,
            size: 4
        },
        "the lowest branch pc inside [start, end) wins"
    );
    assert!(btac.lookup_window(0x1010, 0x1020).is_none(), "end is exclusive");
}

#[test]
fn btac_evicts_the_least_recently_used_entry() {
    let mut btac = Btac::new(2);
    btac.update(0x100, 0x200, 4);
    btac.update(0x104, 0x300, 4);
    // Promote 0x100 so 0x104 is the oldest.
    assert!(btac.lookup_window(0x100, 0x104).is_some());
    btac.update(0x108, 0x400, 4);

    assert_eq!(btac.len(), 2);
    assert!(btac.get(0x100).is_some());
    assert!(btac.get(0x104).is_none(), "evicted");
    assert!(btac.get(0x108).is_some());
}

#[test]
fn btac_update_replaces_the_target() {
    let mut btac = Btac::new(4);
    btac.update(0x100, 0x200, 4);
    btac.update(0x100, 0x280, 4);
    assert_eq!(btac.len(), 1);
    assert_eq!(btac.get(0x100).map(|e| e.targetpc), Some(0x280));
    assert!(btac.remove(0x100).is_some());
    assert!(btac.is_empty());
}
