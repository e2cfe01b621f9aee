//! Instruction encoder.
//!
//! The inverse of [`decode`](super::decode): rebuilds the encoding of a record from
//! its operation and fields. Compressed records, and operations whose encoding
//! carries bits the record does not model (FENCE, ECALL, EBREAK, NOP, undefined
//! words), are reproduced from the stored `word`.

use super::fields::{funct3, funct7, opcodes};
use super::instruction::Instruction;
use super::opcode::{Format, Opcode};
use crate::common::constants::INSTRUCTION_SIZE_16;

/// Returns the little-endian bytes of `insn` (2 or 4 of them).
pub fn encode(insn: &Instruction) -> Vec<u8> {
    if insn.size == INSTRUCTION_SIZE_16 {
        return (insn.word as u16).to_le_bytes().to_vec();
    }
    encode_word(insn).to_le_bytes().to_vec()
}

/// Encodes an uncompressed record as a 32-bit word.
pub fn encode_word(insn: &Instruction) -> u32 {
    let Some((op, f3, f7)) = encoding(insn.cmd) else {
        return insn.word;
    };
    let rd = u32::from(insn.rd.unwrap_or(0)) << 7;
    let rs1 = u32::from(insn.rs1.unwrap_or(0)) << 15;
    let rs2 = u32::from(insn.rs2.unwrap_or(0)) << 20;
    let imm = insn.imm.unwrap_or(0) as u32;
    let f3 = f3 << 12;
    match insn.cmd.format() {
        Format::R => (f7 << 25) | rs2 | rs1 | f3 | rd | op,
        Format::I => ((imm & 0xfff) << 20) | rs1 | f3 | rd | op,
        Format::Shift => {
            let shamt = insn.shamt.unwrap_or(0) & 0x3f;
            ((f7 >> 1) << 26) | (shamt << 20) | rs1 | f3 | rd | op
        }
        Format::ShiftW => {
            let shamt = insn.shamt.unwrap_or(0) & 0x1f;
            (f7 << 25) | (shamt << 20) | rs1 | f3 | rd | op
        }
        Format::S => {
            let hi = (imm >> 5) & 0x7f;
            let lo = imm & 0x1f;
            (hi << 25) | rs2 | rs1 | f3 | (lo << 7) | op
        }
        Format::B => {
            let b12 = (imm >> 12) & 1;
            let b11 = (imm >> 11) & 1;
            let b10_5 = (imm >> 5) & 0x3f;
            let b4_1 = (imm >> 1) & 0xf;
            (b12 << 31) | (b10_5 << 25) | rs2 | rs1 | f3 | (b4_1 << 8) | (b11 << 7) | op
        }
        Format::U => (imm & 0xffff_f000) | rd | op,
        Format::J => {
            let b20 = (imm >> 20) & 1;
            let b19_12 = (imm >> 12) & 0xff;
            let b11 = (imm >> 11) & 1;
            let b10_1 = (imm >> 1) & 0x3ff;
            (b20 << 31) | (b10_1 << 21) | (b11 << 20) | (b19_12 << 12) | rd | op
        }
        Format::Bare => insn.word,
    }
}

/// `(opcode, funct3, funct7)` of an operation with a field-determined encoding.
///
/// For 64-bit shift immediates the returned `funct7` holds `funct6 << 1`.
fn encoding(cmd: Opcode) -> Option<(u32, u32, u32)> {
    use Opcode::*;
    use funct3 as f3;
    use funct7 as f7;
    use opcodes as op;
    let enc = match cmd {
        Lui => (op::OP_LUI, 0, 0),
        Auipc => (op::OP_AUIPC, 0, 0),
        Jal => (op::OP_JAL, 0, 0),
        Jalr => (op::OP_JALR, 0, 0),
        Beq => (op::OP_BRANCH, f3::BEQ, 0),
        Bne => (op::OP_BRANCH, f3::BNE, 0),
        Blt => (op::OP_BRANCH, f3::BLT, 0),
        Bge => (op::OP_BRANCH, f3::BGE, 0),
        Bltu => (op::OP_BRANCH, f3::BLTU, 0),
        Bgeu => (op::OP_BRANCH, f3::BGEU, 0),
        Lb => (op::OP_LOAD, f3::LB, 0),
        Lh => (op::OP_LOAD, f3::LH, 0),
        Lw => (op::OP_LOAD, f3::LW, 0),
        Ld => (op::OP_LOAD, f3::LD, 0),
        Lbu => (op::OP_LOAD, f3::LBU, 0),
        Lhu => (op::OP_LOAD, f3::LHU, 0),
        Lwu => (op::OP_LOAD, f3::LWU, 0),
        Sb => (op::OP_STORE, f3::SB, 0),
        Sh => (op::OP_STORE, f3::SH, 0),
        Sw => (op::OP_STORE, f3::SW, 0),
        Sd => (op::OP_STORE, f3::SD, 0),
        Addi => (op::OP_IMM, f3::ADD_SUB, 0),
        Slti => (op::OP_IMM, f3::SLT, 0),
        Sltiu => (op::OP_IMM, f3::SLTU, 0),
        Xori => (op::OP_IMM, f3::XOR, 0),
        Ori => (op::OP_IMM, f3::OR, 0),
        Andi => (op::OP_IMM, f3::AND, 0),
        Slli => (op::OP_IMM, f3::SLL, f7::BASE),
        Srli => (op::OP_IMM, f3::SRL_SRA, f7::BASE),
        Srai => (op::OP_IMM, f3::SRL_SRA, f7::SRAI_FUNCT6 << 1),
        Add => (op::OP_REG, f3::ADD_SUB, f7::BASE),
        Sub => (op::OP_REG, f3::ADD_SUB, f7::ALT),
        Sll => (op::OP_REG, f3::SLL, f7::BASE),
        Slt => (op::OP_REG, f3::SLT, f7::BASE),
        Sltu => (op::OP_REG, f3::SLTU, f7::BASE),
        Xor => (op::OP_REG, f3::XOR, f7::BASE),
        Srl => (op::OP_REG, f3::SRL_SRA, f7::BASE),
        Sra => (op::OP_REG, f3::SRL_SRA, f7::ALT),
        Or => (op::OP_REG, f3::OR, f7::BASE),
        And => (op::OP_REG, f3::AND, f7::BASE),
        Addiw => (op::OP_IMM_32, f3::ADD_SUB, 0),
        Slliw => (op::OP_IMM_32, f3::SLL, f7::BASE),
        Srliw => (op::OP_IMM_32, f3::SRL_SRA, f7::BASE),
        Sraiw => (op::OP_IMM_32, f3::SRL_SRA, f7::ALT),
        Addw => (op::OP_REG_32, f3::ADD_SUB, f7::BASE),
        Subw => (op::OP_REG_32, f3::ADD_SUB, f7::ALT),
        Sllw => (op::OP_REG_32, f3::SLL, f7::BASE),
        Srlw => (op::OP_REG_32, f3::SRL_SRA, f7::BASE),
        Sraw => (op::OP_REG_32, f3::SRL_SRA, f7::ALT),
        Mul => (op::OP_REG, f3::MUL, f7::MULDIV),
        Mulh => (op::OP_REG, f3::MULH, f7::MULDIV),
        Mulhsu => (op::OP_REG, f3::MULHSU, f7::MULDIV),
        Mulhu => (op::OP_REG, f3::MULHU, f7::MULDIV),
        Div => (op::OP_REG, f3::DIV, f7::MULDIV),
        Divu => (op::OP_REG, f3::DIVU, f7::MULDIV),
        Rem => (op::OP_REG, f3::REM, f7::MULDIV),
        Remu => (op::OP_REG, f3::REMU, f7::MULDIV),
        Mulw => (op::OP_REG_32, f3::MUL, f7::MULDIV),
        Divw => (op::OP_REG_32, f3::DIV, f7::MULDIV),
        Divuw => (op::OP_REG_32, f3::DIVU, f7::MULDIV),
        Remw => (op::OP_REG_32, f3::REM, f7::MULDIV),
        Remuw => (op::OP_REG_32, f3::REMU, f7::MULDIV),
        Fence | Ecall | Ebreak | Nop | Undefined => return None,
    };
    Some(enc)
}
