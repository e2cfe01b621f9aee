//! Snapshot Tests.
//!
//! A snapshot holds retirement, lets in-flight work settle, writes the
//! architectural state into memory and persists memory to a file. Resuming
//! from that file must end exactly where an uninterrupted run ends.

use std::path::Path;

use crate::common::asm::{A0, addi, bne, exit, program};
use crate::common::harness::{config, init_tracing, run};
use nebula_core::common::{ProtocolError, RegName, SimError};
use nebula_core::config::Config;
use nebula_core::sim::loader::Program;
use nebula_core::sim::snapshot::Snapshot;
use nebula_core::{RunReport, Simulation, StopReason};
use pretty_assertions::assert_eq;

/// x6 += 3, twelve times; exits with x6.
fn counting() -> Program {
    let mut words = vec![
        addi(5, 0, 12),
        addi(6, 0, 0),
        addi(6, 6, 3),
        addi(5, 5, -1),
        bne(5, 0, -8),
        addi(A0, 6, 0),
    ];
    words.extend(exit());
    program(0x1000, &words)
}

/// Runs until `instructions` have retired and snapshots to `path`.
fn run_partway(config: Config, instructions: u64, path: &Path) -> RunReport {
    init_tracing();
    let mut config = config;
    config.simulation.max_instructions = Some(instructions);
    Simulation::new(config, counting())
        .final_snapshot(path)
        .run()
        .unwrap()
}

fn resume(config: Config, path: &Path) -> RunReport {
    Simulation::restore(config, path).run().unwrap()
}

// ══════════════════════════════════════════════════════════
// 1. Snapshot Contents
// ══════════════════════════════════════════════════════════

#[test]
fn snapshot_records_the_resume_cycle_and_pc() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partway.json");
    let report = run_partway(config(), 10, &path);

    assert_eq!(report.stop, Some(StopReason::MaxInstructions));
    assert_eq!(report.snapshots, vec![path.clone()]);
    let snapshot = Snapshot::load(&path).unwrap();
    assert!(snapshot.cycle() > report.instructions, "at least a cycle per retirement");
    assert!(snapshot.cycle() <= snapshot.written_at, "the marker is set before the file is written");
    let pc = snapshot.register(0, RegName::Pc);
    assert!((0x1000..0x1000 + 9 * 4).contains(&pc), "%pc {pc:#x} is inside the program");
}

#[test]
fn snapshot_keeps_the_program_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.json");
    let _ = run_partway(config(), 5, &path);

    let snapshot = Snapshot::load(&path).unwrap();
    assert_eq!(snapshot.read_virtual(0, 0x1000, 4), addi(5, 0, 12).to_le_bytes().to_vec());
    assert_eq!(snapshot.read_virtual(1, 0x1000, 4), vec![0; 4], "core 1 never existed");
}

// ══════════════════════════════════════════════════════════
// 2. Restore Equivalence
// ══════════════════════════════════════════════════════════

#[test]
fn restored_run_matches_an_uninterrupted_run() {
    let whole = run(config(), counting());
    assert_eq!(whole.exit_code(), Some(36));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partway.json");
    let first = run_partway(config(), 17, &path);
    let second = resume(config(), &path);

    assert_eq!(second.stop, Some(StopReason::Shutdown));
    assert_eq!(second.exit_code(), Some(36));
    assert_eq!(second.registers.get(&0), whole.registers.get(&0), "same final architectural state");
    assert!(second.cycles > first.cycles, "time continues from the snapshot");
}

#[rstest::rstest]
fn restore_works_under_both_branch_resolution_modes(#[values(true, false)] early: bool) {
    let mut config = config();
    config.pipeline.early_branch_resolution = early;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partway.json");
    let _ = run_partway(config.clone(), 23, &path);
    assert_eq!(resume(config, &path).exit_code(), Some(36));
}

#[test]
fn missing_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Simulation::restore(config(), &dir.path().join("absent.json"))
        .run()
        .unwrap_err();
    assert!(matches!(err, SimError::Protocol(ProtocolError::Snapshot { .. })));
}

// ══════════════════════════════════════════════════════════
// 3. Periodic Snapshots
// ══════════════════════════════════════════════════════════

#[test]
fn periodic_snapshots_land_in_the_directory() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.simulation.snapshot_period = Some(10);
    config.simulation.snapshot_dir = Some(dir.path().to_path_buf());
    let report = Simulation::new(config.clone(), counting()).run().unwrap();

    assert_eq!(report.exit_code(), Some(36), "snapshots do not disturb the program");
    assert!(report.snapshots.len() >= 2, "{} snapshots", report.snapshots.len());
    for path in &report.snapshots {
        assert!(path.starts_with(dir.path()));
        assert!(path.exists(), "{} was written", path.display());
    }

    config.simulation.snapshot_period = None;
    let resumed = resume(config, &report.snapshots[0]);
    assert_eq!(resumed.exit_code(), Some(36));
}
