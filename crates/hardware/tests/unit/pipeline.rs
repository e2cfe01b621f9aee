//! Full Pipeline Tests.
//!
//! Small hand-assembled programs run through every component. The probe
//! records what crosses the coordinator so the tests can check the retirement
//! contract as well as the final architectural state.

use crate::common::asm::{A0, add, addi, bne, exit, exit_with, jal, ld, lui, lw, program, sd, sw};
use crate::common::harness::Recording;
use crate::common::harness::{self, config, run, run_probed};
use nebula_core::common::{CoreId, ProtocolError, RegName, SimError};
use nebula_core::sim::component::{Component, Outbox};
use nebula_core::sim::message::{Envelope, Event, FetchCmd, RegisterCmd, Response};
use nebula_core::{Simulation, StopReason};
use pretty_assertions::assert_eq;
use rstest::rstest;

/// x6 += 2, ten times; exits with x6.
fn countdown() -> Vec<u32> {
    let mut words = vec![
        addi(5, 0, 10),
        addi(6, 0, 0),
        addi(6, 6, 2),
        addi(5, 5, -1),
        bne(5, 0, -8),
        addi(A0, 6, 0),
    ];
    words.extend(exit());
    words
}

// ══════════════════════════════════════════════════════════
// 1. Retirement Contract
// ══════════════════════════════════════════════════════════

#[test]
fn single_addi_retires_first_and_sets_pc() {
    let mut words = vec![addi(1, 0, 5)];
    words.extend(exit_with(0));
    let (report, rec) = run_probed(config(), program(0x1000, &words));

    let retired = rec.retired();
    assert_eq!(retired.first(), Some(&(0, 0x1000, 0x1004)));
    let first_pc_write = rec.events.iter().find_map(|(_, env)| match env.body {
        Event::Register(RegisterCmd::Set { name: RegName::Pc, data }) => Some(data),
        _ => None,
    });
    assert_eq!(first_pc_write, Some(0x1004), "%pc moves past the addi first");
    assert_eq!(report.register(0, RegName::X(1)), Some(5));
    assert_eq!(report.stop, Some(StopReason::Shutdown));
}

#[test]
fn instructions_retire_in_iid_order() {
    let (report, rec) = run_probed(config(), program(0x1000, &countdown()));
    let retired = rec.retired();
    assert!(!retired.is_empty());
    for pair in retired.windows(2) {
        assert!(pair[0].0 < pair[1].0, "iid {} retired before {}", pair[0].0, pair[1].0);
        assert_eq!(pair[0].2, pair[1].1, "each retirement continues where the last one went");
    }
    assert_eq!(report.instructions, retired.len() as u64);
}

#[rstest]
fn branch_loop_recovers_from_mispredicts(
    #[values(true, false)] early_branch_resolution: bool,
    #[values(true, false)] result_forwarding: bool,
) {
    let mut config = config();
    config.pipeline.early_branch_resolution = early_branch_resolution;
    config.pipeline.result_forwarding = result_forwarding;
    let (report, rec) = run_probed(config, program(0x1000, &countdown()));

    assert_eq!(report.exit_code(), Some(20));
    assert_eq!(report.register(0, RegName::X(5)), Some(0));
    assert!(rec.count("mispredict") > 0, "a cold BTAC mispredicts the first taken branch");
    // 2 setup + 10 * 3 loop body + 1 move + exit's addi and ecall
    assert_eq!(report.instructions, 35);
}

/// A taken `bne` at 0x1010 that a cold predictor runs past into a store and a
/// register write; the load at the target sees the older store.
fn skips_a_store() -> Vec<u32> {
    let mut words = vec![
        lui(6, 0x20000),
        addi(7, 0, 5),
        sd(7, 6, 0),
        addi(8, 0, 1),
        bne(8, 0, 12),
        // wrong path
        sd(8, 6, 0),
        addi(9, 0, 77),
        // target, 0x101c
        ld(A0, 6, 0),
    ];
    words.extend(exit());
    words
}

fn mispredicts(rec: &Recording) -> Vec<(u64, u64, u64)> {
    rec.results
        .iter()
        .filter_map(|(cycle, env)| match &env.body {
            Response::Mispredict { insn } => Some((*cycle, insn.pc, insn.actual_next())),
            _ => None,
        })
        .collect()
}

#[rstest]
fn wrong_path_writes_are_never_observed(#[values(true, false)] early_branch_resolution: bool) {
    let mut config = config();
    config.pipeline.early_branch_resolution = early_branch_resolution;
    let (report, rec) = run_probed(config, program(0x1000, &skips_a_store()));

    assert_eq!(report.exit_code(), Some(5), "the load sees the older store");
    assert_eq!(report.register(0, RegName::X(9)).unwrap_or(0), 0);
    let x9_writes = rec
        .events
        .iter()
        .filter(|(_, env)| {
            matches!(env.body, Event::Register(RegisterCmd::Set {
                name: RegName::X(9),
                ..
            }))
        })
        .count();
    assert_eq!(x9_writes, 0, "the skipped addi never reaches the register file");
}

#[rstest]
fn mispredicted_branch_redirects_fetch_once(#[values(true, false)] early_branch_resolution: bool) {
    let mut config = config();
    config.pipeline.early_branch_resolution = early_branch_resolution;
    let (_, rec) = run_probed(config, program(0x1000, &skips_a_store()));

    let seen = mispredicts(&rec);
    assert_eq!(seen.len(), 1, "one mispredict for the one branch: {seen:?}");
    let (cycle, pc, target) = seen[0];
    assert_eq!((pc, target), (0x1010, 0x101c));

    let next_get = rec.events.iter().find_map(|(at, env)| match env.body {
        Event::Fetch(FetchCmd::Get { addr }) if *at > cycle => Some(addr),
        _ => None,
    });
    assert_eq!(next_get, Some(target), "fetch restarts at the realized target");
}

#[test]
fn narrow_decode_window_keeps_fetch_flowing() {
    let mut config = config();
    config.decode.max_bytes_to_decode = 4;
    let mut words = vec![
        addi(5, 0, 100),
        addi(6, 0, 0),
        addi(6, 6, 1),
        addi(5, 5, -1),
        bne(5, 0, -8),
        addi(A0, 6, 0),
    ];
    words.extend(exit());
    let report = run(config, program(0x1000, &words));

    assert_eq!(report.stop, Some(StopReason::Shutdown));
    assert_eq!(report.exit_code(), Some(100));
    assert_eq!(report.instructions, 2 + 100 * 3 + 1 + 2);
}

// ══════════════════════════════════════════════════════════
// 2. Memory Path
// ══════════════════════════════════════════════════════════

#[test]
fn stores_are_visible_to_later_loads() {
    let mut words = vec![
        lui(6, 0x20000),
        addi(7, 0, -2),
        sd(7, 6, 0),
        ld(8, 6, 0),
        sw(7, 6, 8),
        lw(9, 6, 8),
        add(A0, 8, 9),
    ];
    words.extend(exit());
    let report = run(config(), program(0x1000, &words));
    assert_eq!(report.register(0, RegName::X(8)), Some(u64::MAX - 1));
    assert_eq!(report.register(0, RegName::X(9)), Some(u64::MAX - 1), "lw sign-extends");
    assert_eq!(report.exit_code(), Some(-4i64 as u64));
}

#[test]
fn loads_refill_after_conflict_evictions() {
    let mut config = config();
    config.l1dc.nsets = 2;
    config.l1dc.nways = 1;
    config.l1dc.blocksize = 16;
    let mut words = vec![
        lui(6, 0x20000),
        addi(7, 0, 17),
        sw(7, 6, 0),
        addi(7, 0, 25),
        // Same set, evicts the first block.
        sw(7, 6, 0x20),
        lw(8, 6, 0),
        lw(9, 6, 0x20),
        add(A0, 8, 9),
    ];
    words.extend(exit());
    let report = run(config, program(0x1000, &words));
    assert_eq!(report.exit_code(), Some(42));
}

#[rstest]
fn youngest_store_wins(#[values(true, false)] result_forwarding: bool) {
    let mut config = config();
    config.pipeline.result_forwarding = result_forwarding;
    let mut words = vec![
        lui(6, 0x20000),
        addi(7, 0, 11),
        sd(7, 6, 0),
        addi(7, 0, 22),
        sd(7, 6, 0),
        ld(A0, 6, 0),
    ];
    words.extend(exit());
    assert_eq!(run(config, program(0x1000, &words)).exit_code(), Some(22));
}

#[rstest]
fn accesses_across_a_block_boundary(#[values(true, false)] result_forwarding: bool) {
    let mut config = config();
    config.pipeline.result_forwarding = result_forwarding;
    // 16-byte blocks: the sd at +12, the sw at +30 and the ld at +10 each span
    // two blocks. The last ld only partly overlaps the sd, so it reads memory.
    let mut words = vec![
        lui(6, 0x20000),
        addi(7, 0, -3),
        sd(7, 6, 12),
        ld(8, 6, 12),
        addi(7, 0, 9),
        sw(7, 6, 30),
        lw(9, 6, 30),
        ld(A0, 6, 10),
    ];
    words.extend(exit());
    let report = run(config, program(0x1000, &words));
    assert_eq!(report.register(0, RegName::X(8)), Some(-3i64 as u64));
    assert_eq!(report.register(0, RegName::X(9)), Some(9));
    assert_eq!(report.exit_code(), Some(0xffff_ffff_fffd_0000));
}

#[test]
fn program_reads_its_own_image() {
    // lw of the first instruction word.
    let mut words = vec![lui(6, 0x1000), lw(A0, 6, 0)];
    words.extend(exit());
    let expected = i64::from(lui(6, 0x1000) as i32) as u64;
    let report = run(config(), program(0x1000, &words));
    assert_eq!(report.exit_code(), Some(expected));
}

// ══════════════════════════════════════════════════════════
// 3. Multiple Cores
// ══════════════════════════════════════════════════════════

#[test]
fn every_core_runs_the_program_in_its_own_space() {
    let mut config = config();
    config.simulation.cores = 2;
    let mut words = vec![lui(6, 0x20000), lw(7, 6, 0), addi(7, 7, 9), sw(7, 6, 0), addi(A0, 7, 0)];
    words.extend(exit());
    let report = run(config, program(0x1000, &words));

    assert_eq!(report.stop, Some(StopReason::Shutdown));
    assert_eq!(report.register(0, RegName::X(A0)), Some(9));
    assert_eq!(
        report.register(1, RegName::X(A0)),
        Some(9),
        "core 1 does not see core 0's store"
    );
    assert_eq!(report.instructions, 2 * 7);
}

// ══════════════════════════════════════════════════════════
// 4. Termination
// ══════════════════════════════════════════════════════════

#[test]
fn undefined_instruction_halts_when_asked() {
    let mut config = config();
    config.simulation.break_on_undefined = true;
    let mut words = vec![0];
    words.extend(exit_with(1));
    let report = run(config, program(0x1000, &words));

    assert_eq!(report.stop, Some(StopReason::Undefined));
    assert_eq!(report.undefined.first().map(|u| u.pc), Some(0x1000));
}

#[test]
fn watchdog_ends_a_silent_core() {
    let mut config = config();
    config.watchdog.result_name = Some("l1dc".into());
    config.watchdog.result_cycles = Some(200);
    let report = run(config, program(0x1000, &[jal(0, 0)]));

    assert_eq!(report.stop, Some(StopReason::Shutdown));
    assert!(report.cycles > 200);
    assert!(report.cycles < 50_000, "well before the cycle cap");
}

#[test]
fn cycle_budget_stops_an_endless_loop() {
    let mut config = config();
    config.simulation.max_cycles = Some(300);
    let report = run(config, program(0x1000, &[jal(0, 0)]));
    assert_eq!(report.stop, Some(StopReason::MaxCycles));
    assert!(report.cycles >= 300);
}

#[test]
fn instruction_budget_stops_an_endless_loop() {
    let mut config = config();
    config.simulation.max_instructions = Some(50);
    let report = run(config, program(0x1000, &[jal(0, 0)]));
    assert_eq!(report.stop, Some(StopReason::MaxInstructions));
    assert!(report.instructions >= 50);
}

// ══════════════════════════════════════════════════════════
// 5. Protocol Violations
// ══════════════════════════════════════════════════════════

/// Schedules an event for the cycle it is processing.
#[derive(Debug)]
struct Rogue;

impl Component for Rogue {
    fn name(&self) -> &'static str {
        "rogue"
    }

    fn coreid(&self) -> Option<CoreId> {
        None
    }

    fn tick(
        &mut self,
        _results: &[Envelope<Response>],
        _events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        out.event(0, Event::Output { fd: 1, data: "now".into() });
        Ok(())
    }
}

#[test]
fn envelope_for_the_current_cycle_aborts_the_run() {
    harness::init_tracing();
    let err = Simulation::new(config(), program(0x1000, &exit_with(0)))
        .with_component(Box::new(Rogue))
        .run()
        .unwrap_err();
    match err {
        SimError::Protocol(ProtocolError::ArrivalNotInFuture { service, arrival, cycle }) => {
            assert_eq!(service, "rogue");
            assert_eq!(arrival, cycle);
        }
        other => panic!("expected ArrivalNotInFuture, got {other}"),
    }
}
