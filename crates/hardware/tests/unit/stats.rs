//! Statistics Tests.
//!
//! At the end of a run every component reports its counters to the collector.
//! The report carries them as a tree of scope, service and counter name.

use crate::common::asm::{A0, addi, exit, lui, lw, program, sw};
use crate::common::harness::{config, run};
use nebula_core::stats::StatsTree;
use pretty_assertions::assert_eq;

fn loads_and_stores() -> nebula_core::sim::loader::Program {
    let mut words = vec![lui(6, 0x20000), addi(7, 0, 5), sw(7, 6, 0), lw(A0, 6, 0)];
    words.extend(exit());
    program(0x1000, &words)
}

#[test]
fn commit_count_matches_the_retired_instructions() {
    let report = run(config(), loads_and_stores());
    assert_eq!(report.exit_code(), Some(5));
    assert_eq!(report.stats.flat(Some(0), "commit", "retired"), report.instructions);
    assert_eq!(report.instructions, 6);
}

#[test]
fn shared_components_report_under_the_shared_scope() {
    let report = run(config(), loads_and_stores());
    assert!(report.stats.flat(None, "l2", "accesses") > 0, "fetch and the LSU both miss to the L2");
    assert!(report.stats.flat(None, "l2", "misses") > 0);
    assert_eq!(report.stats.flat(Some(0), "l2", "accesses"), 0, "the L2 is not per core");
}

#[test]
fn rendered_listing_names_every_scope() {
    let report = run(config(), loads_and_stores());
    let text = report.stats.render();
    assert!(text.contains("CORE0"));
    assert!(text.contains("SHARED"));
    assert!(text.contains("commit.retired"));
}

#[test]
fn collector_writes_json_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats.json");
    let mut config = config();
    config.stats.output_filename = Some(path.clone());
    let report = run(config, loads_and_stores());

    let text = std::fs::read_to_string(&path).unwrap();
    let written: StatsTree = serde_json::from_str(&text).unwrap();
    assert_eq!(
        written.flat(Some(0), "commit", "retired"),
        report.instructions,
        "the file agrees with the report"
    );
}
