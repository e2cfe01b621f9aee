//! ISA Model Tests.
//!
//! Decoding of known words and byte windows, compressed expansion, the execute
//! model and load extension. Property tests check that decoding never panics
//! and that every 32-bit word re-encodes to itself.

use crate::common::asm::{addi, beq, bne, jalr, op};
use nebula_core::isa::decode::{decode, decode_compressed, decode_word};
use nebula_core::isa::encode::encode_word;
use nebula_core::isa::execute::{Outcome, execute};
use nebula_core::isa::{Instruction, Opcode, rvc};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

/// Decodes `word` at 0x1000 with x1 = `a` and x2 = `b` resolved.
fn run(word: u32, a: u64, b: u64) -> Outcome {
    let mut insn = decode_word(word, 0x1000);
    let _ = insn.operands.insert(1, a);
    let _ = insn.operands.insert(2, b);
    execute(&insn)
}

// ══════════════════════════════════════════════════════════
// 1. Decoding Known Words
// ══════════════════════════════════════════════════════════

#[test]
fn decodes_addi() {
    let insn = decode_word(0x0050_0093, 0x1000);
    assert_eq!(insn.cmd, Opcode::Addi);
    assert_eq!(insn.rd, Some(1));
    assert_eq!(insn.rs1, Some(0));
    assert_eq!(insn.imm, Some(5));
    assert_eq!(insn.size, 4);
}

#[test]
fn decodes_a_backward_jal() {
    let insn = decode_word(0xff1f_f06f, 0x2000);
    assert_eq!(insn.cmd, Opcode::Jal);
    assert_eq!(insn.rd, Some(0));
    assert_eq!(insn.imm, Some(-16), "J-immediate is sign-extended");
}

#[test]
fn decodes_lw_with_its_access_width() {
    let insn = decode_word(0x0040_a183, 0);
    assert_eq!(insn.cmd, Opcode::Lw);
    assert_eq!(insn.rd, Some(3));
    assert_eq!(insn.rs1, Some(1));
    assert_eq!(insn.imm, Some(4));
    assert_eq!(insn.nbytes, Some(4));
}

#[test]
fn all_ones_word_is_undefined() {
    let insn = decode_word(0xffff_ffff, 0);
    assert_eq!(insn.cmd, Opcode::Undefined);
    assert!(insn.sources().is_empty(), "undefined words read no registers");
}

#[test]
fn ecall_reads_the_syscall_registers() {
    let insn = decode_word(0x0000_0073, 0);
    assert_eq!(insn.cmd, Opcode::Ecall);
    assert_eq!(insn.sources(), vec![10, 11, 12, 13, 14, 15, 17]);
}

// ══════════════════════════════════════════════════════════
// 2. Compressed Instructions
// ══════════════════════════════════════════════════════════

#[test]
fn c_addi_expands_to_a_two_byte_addi() {
    assert_eq!(rvc::expand(0x0085), addi(1, 1, 1));
    let insn = decode_compressed(0x0085, 0x1000);
    assert_eq!(insn.cmd, Opcode::Addi);
    assert_eq!(insn.size, 2);
    assert_eq!(insn.word, 0x0085, "the original parcel is kept");
    assert_eq!(insn.fallthrough(), 0x1002);
}

#[test]
fn mixed_window_decodes_in_order() {
    let mut bytes = addi(1, 0, 5).to_le_bytes().to_vec();
    bytes.extend_from_slice(&0x0085u16.to_le_bytes());
    bytes.extend_from_slice(&0x0040_a183u32.to_le_bytes());

    let insns = decode(&bytes, 0x1000, 8);
    let summary: Vec<(u64, Opcode, u64)> = insns.iter().map(|i| (i.pc, i.cmd, i.size)).collect();
    assert_eq!(
        summary,
        vec![
            (0x1000, Opcode::Addi, 4),
            (0x1004, Opcode::Addi, 2),
            (0x1006, Opcode::Lw, 4),
        ]
    );
}

#[test]
fn window_limit_caps_the_decode() {
    let bytes: Vec<u8> = [addi(1, 0, 1), addi(2, 0, 2), addi(3, 0, 3)]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect();
    assert_eq!(decode(&bytes, 0, 2).len(), 2);
}

// ══════════════════════════════════════════════════════════
// 3. Execute Model
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::add(Opcode::Add, 40, 2, 42)]
#[case::sub_wraps(Opcode::Sub, 0, 1, u64::MAX)]
#[case::mul(Opcode::Mul, 6, 7, 42)]
#[case::mulhu(Opcode::Mulhu, u64::MAX, u64::MAX, u64::MAX - 1)]
#[case::div_by_zero(Opcode::Div, 10, 0, u64::MAX)]
#[case::divu_by_zero(Opcode::Divu, 10, 0, u64::MAX)]
#[case::rem_by_zero(Opcode::Rem, 10, 0, 10)]
#[case::div_overflow(Opcode::Div, i64::MIN as u64, -1i64 as u64, i64::MIN as u64)]
#[case::rem_overflow(Opcode::Rem, i64::MIN as u64, -1i64 as u64, 0)]
#[case::addw_sign_extends(Opcode::Addw, 0x7fff_ffff, 1, 0xffff_ffff_8000_0000)]
#[case::sltu(Opcode::Sltu, 1, u64::MAX, 1)]
#[case::slt_signed(Opcode::Slt, u64::MAX, 1, 1)]
fn register_operations(#[case] cmd: Opcode, #[case] a: u64, #[case] b: u64, #[case] expected: u64) {
    let outcome = run(op(cmd, 3, 1, 2), a, b);
    assert_eq!(outcome.result, Some(expected), "{cmd} {a:#x}, {b:#x}");
    assert_eq!(outcome.next_pc, None, "not a control op");
}

#[test]
fn branch_not_taken_falls_through() {
    let outcome = run(bne(1, 2, 16), 7, 7);
    assert_eq!(outcome.taken, Some(false));
    assert_eq!(outcome.next_pc, Some(0x1004));
}

#[test]
fn branch_taken_goes_to_target() {
    let outcome = run(beq(1, 2, 16), 7, 7);
    assert_eq!(outcome.taken, Some(true));
    assert_eq!(outcome.next_pc, Some(0x1010));
}

#[test]
fn jalr_clears_the_low_bit_and_links() {
    let outcome = run(jalr(5, 1, 3), 0x2000, 0);
    assert_eq!(outcome.next_pc, Some(0x2002));
    assert_eq!(outcome.ret_pc, Some(0x1004));
    assert_eq!(outcome.result, None, "the link value travels as ret_pc");
}

#[test]
fn memory_ops_only_compute_the_address() {
    let outcome = run(0x0040_a183, 0x8000, 0);
    assert_eq!(outcome.addr, Some(0x8004));
    assert_eq!(outcome.result, None);
}

// ══════════════════════════════════════════════════════════
// 4. Load Extension and Store Data
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::lb(Opcode::Lb, &[0x80], 0xffff_ffff_ffff_ff80)]
#[case::lbu(Opcode::Lbu, &[0x80], 0x80)]
#[case::lw(Opcode::Lw, &[0, 0, 0, 0x80], 0xffff_ffff_8000_0000)]
#[case::lwu(Opcode::Lwu, &[0, 0, 0, 0x80], 0x8000_0000)]
#[case::ld(Opcode::Ld, &[0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff], u64::MAX - 1)]
fn loads_extend_per_opcode(#[case] cmd: Opcode, #[case] data: &[u8], #[case] expected: u64) {
    let insn = Instruction::new(cmd, 0, 4, 0);
    assert_eq!(insn.extend_load(data), Some(expected));
}

#[test]
fn store_bytes_are_truncated_to_the_width() {
    let mut insn = decode_word(crate::common::asm::sw(2, 1, 0), 0);
    let _ = insn.operands.insert(2, 0x1122_3344_5566_7788);
    assert_eq!(insn.store_bytes(), Some(vec![0x88, 0x77, 0x66, 0x55]));
}

// ══════════════════════════════════════════════════════════
// 5. Properties
// ══════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn addi_fields_survive_encode_and_decode(rd in 0u8..32, rs1 in 0u8..32, imm in -2048i64..2048) {
        let insn = decode_word(addi(rd, rs1, imm), 0);
        prop_assert_eq!(insn.cmd, Opcode::Addi);
        prop_assert_eq!(insn.rd, Some(rd));
        prop_assert_eq!(insn.rs1, Some(rs1));
        prop_assert_eq!(insn.imm, Some(imm));
    }

    #[test]
    fn every_word_reencodes_to_itself(word in any::<u32>()) {
        let insn = decode_word(word, 0);
        prop_assert_eq!(encode_word(&insn), word, "{} {:#010x}", insn.cmd, word);
    }

    #[test]
    fn decode_never_overruns_its_window(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let insns = decode(&bytes, 0x1000, 64);
        let consumed: u64 = insns.iter().map(|i| i.size).sum();
        prop_assert!(consumed as usize <= bytes.len());
        for pair in insns.windows(2) {
            prop_assert_eq!(pair[0].fallthrough(), pair[1].pc);
        }
    }
}
