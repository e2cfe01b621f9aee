//! Syscall Tests.
//!
//! ECALL is a conversation between the ALU and a syscall proxy. These tests
//! run the Linux proxy directly and end to end, then swap in a mocked proxy to
//! check the conversation itself: arguments in, peeks answered, result out.

use crate::common::asm::{A0, A1, A2, A7, SYS_WRITE, addi, ecall, exit, exit_with, lui, program};
use crate::common::harness::{config, init_tracing, run};
use mockall::mock;
use nebula_core::common::{CoreId, Cycle, RegName};
use nebula_core::isa::syscall::{ENOSYS, LinuxSyscalls, SyscallEffect, SyscallProxy};
use nebula_core::sim::loader::Program;
use nebula_core::{RunReport, Simulation, StopReason};
use pretty_assertions::assert_eq;

mock! {
    pub Proxy {}
    impl SyscallProxy for Proxy {
        fn do_syscall(&mut self, num: u64, args: [u64; 6], cycle: Cycle, extra: &[Vec<u8>]) -> SyscallEffect;
    }
}

/// `words` at 0x1000 followed by `data` at 0x1100.
fn with_data(words: &[u32], data: &[u8]) -> Program {
    let mut image = crate::common::asm::bytes(words);
    assert!(image.len() <= 0x100, "code overlaps the data");
    image.resize(0x100, 0);
    image.extend_from_slice(data);
    Program::from_bytes(0x1000, image)
}

/// Loads 0x1100 into `reg`.
fn data_address(reg: u8) -> [u32; 2] {
    [lui(reg, 0x1000), addi(reg, reg, 0x100)]
}

/// A mock answering 42 with `a0 + 7`, 500 by reading a word at `a0`, and exit.
fn mocked() -> MockProxy {
    let mut mock = MockProxy::new();
    let _ = mock
        .expect_do_syscall()
        .returning(|num, args, _cycle, extra| match num {
            42 => SyscallEffect::returning(args[0] + 7),
            500 => match extra.first() {
                None => SyscallEffect::peeking(args[0], 4),
                Some(bytes) => {
                    let word: [u8; 4] = bytes.as_slice().try_into().unwrap();
                    SyscallEffect::returning(u64::from(u32::from_le_bytes(word)))
                }
            },
            93 => SyscallEffect {
                done: true,
                shutdown: true,
                ..SyscallEffect::default()
            },
            _ => SyscallEffect::returning(u64::MAX),
        });
    mock
}

fn run_mocked(program: Program) -> RunReport {
    init_tracing();
    Simulation::new(config(), program)
        .with_syscall_proxy(Box::new(|_| Box::new(mocked())))
        .run()
        .unwrap()
}

// ══════════════════════════════════════════════════════════
// 1. Linux Proxy
// ══════════════════════════════════════════════════════════

#[test]
fn write_asks_for_the_buffer_then_prints_it() {
    let mut linux = LinuxSyscalls::new(0x10_0000);
    let args = [1, 0x1100, 3, 0, 0, 0];
    let first = linux.do_syscall(64, args, 10, &[]);
    assert!(!first.done);
    assert_eq!(first.peek.map(|p| (p.addr, p.size)), Some((0x1100, 3)));

    let second = linux.do_syscall(64, args, 12, &[b"hi\n".to_vec()]);
    assert!(second.done);
    assert_eq!(second.result, Some(3));
    assert_eq!(second.output.map(|o| (o.fd, o.data)), Some((1, "hi\n".to_string())));
}

#[test]
fn exit_shuts_down_without_a_result() {
    let effect = LinuxSyscalls::new(0).do_syscall(93, [7, 0, 0, 0, 0, 0], 0, &[]);
    assert!(effect.done && effect.shutdown);
    assert_eq!(effect.result, None, "a0 keeps the exit status");
}

#[test]
fn brk_never_moves_below_the_initial_break() {
    let mut linux = LinuxSyscalls::new(0x10_0000);
    assert_eq!(linux.do_syscall(214, [0; 6], 0, &[]).result, Some(0x10_0000), "query");
    assert_eq!(linux.do_syscall(214, [0x20_0000, 0, 0, 0, 0, 0], 0, &[]).result, Some(0x20_0000));
    assert_eq!(linux.do_syscall(214, [0x1000, 0, 0, 0, 0, 0], 0, &[]).result, Some(0x20_0000));
}

#[test]
fn uname_pokes_the_struct() {
    let effect = LinuxSyscalls::new(0).do_syscall(160, [0x4000, 0, 0, 0, 0, 0], 0, &[]);
    assert_eq!(effect.result, Some(0));
    let poke = &effect.poke[0];
    assert_eq!(poke.addr, 0x4000);
    assert!(poke.data.starts_with(b"Linux\0"));
}

#[test]
fn unknown_syscall_fails_with_enosys() {
    let effect = LinuxSyscalls::new(0).do_syscall(999, [0; 6], 0, &[]);
    assert!(effect.done);
    assert_eq!(effect.result, Some((-ENOSYS) as u64));
}

// ══════════════════════════════════════════════════════════
// 2. End to End
// ══════════════════════════════════════════════════════════

#[test]
fn hello_program_prints_and_exits() {
    let mut words = data_address(A1).to_vec();
    words.extend([addi(A0, 0, 1), addi(A2, 0, 3), addi(A7, 0, SYS_WRITE), ecall()]);
    words.extend(exit_with(0));
    let report = run(config(), with_data(&words, b"hi\n\0"));

    assert_eq!(report.text(1), "hi\n");
    assert_eq!(report.stop, Some(StopReason::Shutdown));
    assert_eq!(report.exit_code(), Some(0));
}

#[test]
fn write_returns_the_byte_count_in_a0() {
    let mut words = data_address(A1).to_vec();
    words.extend([addi(A0, 0, 2), addi(A2, 0, 3), addi(A7, 0, SYS_WRITE), ecall()]);
    words.extend(exit());
    let report = run(config(), with_data(&words, b"hi\n\0"));
    assert_eq!(report.text(2), "hi\n", "fd 2 is kept apart");
    assert_eq!(report.exit_code(), Some(3));
}

// ══════════════════════════════════════════════════════════
// 3. Mocked Proxy
// ══════════════════════════════════════════════════════════

#[test]
fn custom_syscall_result_lands_in_a0() {
    let mut words = vec![addi(A0, 0, 35), addi(A7, 0, 42), ecall()];
    words.extend(exit());
    let report = run_mocked(program(0x1000, &words));
    assert_eq!(report.exit_code(), Some(42));
    assert_eq!(report.stop, Some(StopReason::Shutdown));
}

#[test]
fn proxy_peeks_are_answered_from_guest_memory() {
    let mut words = data_address(A0).to_vec();
    words.extend([addi(A7, 0, 500), ecall()]);
    words.extend(exit());
    let report = run_mocked(with_data(&words, &1234u32.to_le_bytes()));
    assert_eq!(report.exit_code(), Some(1234));
}

#[test]
fn proxy_sees_the_argument_registers() {
    init_tracing();
    let factory = |_: CoreId| {
        let mut mock = MockProxy::new();
        let _ = mock
            .expect_do_syscall()
            .withf(|num, args, _, _| *num == 77 && args[..3] == [1, 2, 3])
            .returning(|_, _, _, _| SyscallEffect::returning(99));
        let _ = mock
            .expect_do_syscall()
            .withf(|num, _, _, _| *num == 93)
            .returning(|_, _, _, _| SyscallEffect {
                done: true,
                shutdown: true,
                ..SyscallEffect::default()
            });
        Box::new(mock) as Box<dyn SyscallProxy>
    };
    let mut words = vec![addi(A0, 0, 1), addi(A1, 0, 2), addi(A2, 0, 3), addi(A7, 0, 77), ecall()];
    words.extend(exit());
    let report = Simulation::new(config(), program(0x1000, &words))
        .with_syscall_proxy(Box::new(factory))
        .run()
        .unwrap();
    assert_eq!(report.register(0, RegName::X(A0)), Some(99));
}
