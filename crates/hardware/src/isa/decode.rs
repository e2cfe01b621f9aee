//! RISC-V Instruction Decoder.
//!
//! Turns a little-endian byte window into typed [`Instruction`] records. It provides:
//! 1. **Windowed Decoding:** `decode` walks a window, recognizing 16- and 32-bit parcels,
//!    and stops at a partial instruction so the caller can retry with more bytes.
//! 2. **Word Decoding:** `decode_word` classifies one 32-bit encoding. Any bit pattern
//!    that is not the canonical encoding of a supported operation is `Undefined`.
//! 3. **Compressed Decoding:** `decode_compressed` expands an RVC parcel and tags the
//!    result with size 2.

use super::fields::{InstructionBits, NOP, funct3, funct7, opcodes};
use super::instruction::Instruction;
use super::opcode::{Format, Opcode};
use super::rvc;
use crate::common::constants::{INSTRUCTION_SIZE_16, INSTRUCTION_SIZE_32};

/// Low two bits of every 32-bit parcel.
const UNCOMPRESSED: u16 = 0b11;

/// Decodes up to `max_insns` instructions from `bytes`, the first at `pc`.
///
/// Decoding stops at the end of the window, or before an instruction whose
/// bytes are not all present. The consumed length is the sum of the returned
/// sizes.
///
/// # Examples
///
/// ```
/// use nebula_core::isa::decode::decode;
/// use nebula_core::isa::opcode::Opcode;
///
/// // addi x1, x0, 5 ; c.nop
/// let insns = decode(&[0x93, 0x00, 0x50, 0x00, 0x01, 0x00], 0x1000, 8);
/// assert_eq!(insns.len(), 2);
/// assert_eq!(insns[0].cmd, Opcode::Addi);
/// assert_eq!(insns[0].imm, Some(5));
/// assert_eq!(insns[1].cmd, Opcode::Nop);
/// assert_eq!(insns[1].pc, 0x1004);
/// ```
pub fn decode(bytes: &[u8], pc: u64, max_insns: usize) -> Vec<Instruction> {
    let mut insns = Vec::new();
    let mut offset = 0usize;
    while insns.len() < max_insns && offset + 2 <= bytes.len() {
        let half = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let at = pc.wrapping_add(offset as u64);
        let insn = if half & UNCOMPRESSED == UNCOMPRESSED {
            let Some(window) = bytes.get(offset..offset + 4) else {
                break;
            };
            let word = u32::from_le_bytes([window[0], window[1], window[2], window[3]]);
            decode_word(word, at)
        } else {
            decode_compressed(half, at)
        };
        offset += insn.size as usize;
        insns.push(insn);
    }
    insns
}

/// Decodes one 16-bit compressed parcel.
///
/// The record carries the expanded operation and fields, with `size` 2 and the
/// original parcel in `word`. Reserved and floating-point encodings are `Undefined`.
pub fn decode_compressed(half: u16, pc: u64) -> Instruction {
    let expanded = rvc::expand(half);
    let mut insn = match expanded {
        0 => Instruction::new(Opcode::Undefined, pc, INSTRUCTION_SIZE_16, 0),
        NOP => Instruction::new(Opcode::Nop, pc, INSTRUCTION_SIZE_16, 0),
        word => decode_word(word, pc),
    };
    insn.size = INSTRUCTION_SIZE_16;
    insn.word = half as u32;
    insn
}

/// Decodes one 32-bit word.
pub fn decode_word(word: u32, pc: u64) -> Instruction {
    let cmd = classify(word);
    let mut insn = Instruction::new(cmd, pc, INSTRUCTION_SIZE_32, word);
    match cmd.format() {
        Format::R => {
            insn.rd = Some(word.rd());
            insn.rs1 = Some(word.rs1());
            insn.rs2 = Some(word.rs2());
        }
        Format::I => {
            insn.rd = Some(word.rd());
            insn.rs1 = Some(word.rs1());
            insn.imm = Some(word.imm_i());
        }
        Format::Shift => {
            insn.rd = Some(word.rd());
            insn.rs1 = Some(word.rs1());
            insn.shamt = Some((word >> 20) & 0x3f);
        }
        Format::ShiftW => {
            insn.rd = Some(word.rd());
            insn.rs1 = Some(word.rs1());
            insn.shamt = Some((word >> 20) & 0x1f);
        }
        Format::S => {
            insn.rs1 = Some(word.rs1());
            insn.rs2 = Some(word.rs2());
            insn.imm = Some(word.imm_s());
        }
        Format::B => {
            insn.rs1 = Some(word.rs1());
            insn.rs2 = Some(word.rs2());
            insn.imm = Some(word.imm_b());
        }
        Format::U => {
            insn.rd = Some(word.rd());
            insn.imm = Some(word.imm_u());
        }
        Format::J => {
            insn.rd = Some(word.rd());
            insn.imm = Some(word.imm_j());
        }
        Format::Bare => {}
    }
    insn.nbytes = cmd.access_width();
    insn
}

/// Maps a word to its operation, or `Undefined` when any fixed bit is off.
fn classify(word: u32) -> Opcode {
    use Opcode::*;
    let f3 = word.funct3();
    let f7 = word.funct7();
    match word.opcode() {
        opcodes::OP_LUI => Lui,
        opcodes::OP_AUIPC => Auipc,
        opcodes::OP_JAL => Jal,
        opcodes::OP_JALR if f3 == 0 => Jalr,
        opcodes::OP_BRANCH => match f3 {
            funct3::BEQ => Beq,
            funct3::BNE => Bne,
            funct3::BLT => Blt,
            funct3::BGE => Bge,
            funct3::BLTU => Bltu,
            funct3::BGEU => Bgeu,
            _ => Undefined,
        },
        opcodes::OP_LOAD => match f3 {
            funct3::LB => Lb,
            funct3::LH => Lh,
            funct3::LW => Lw,
            funct3::LD => Ld,
            funct3::LBU => Lbu,
            funct3::LHU => Lhu,
            funct3::LWU => Lwu,
            _ => Undefined,
        },
        opcodes::OP_STORE => match f3 {
            funct3::SB => Sb,
            funct3::SH => Sh,
            funct3::SW => Sw,
            funct3::SD => Sd,
            _ => Undefined,
        },
        opcodes::OP_IMM => match f3 {
            funct3::ADD_SUB => Addi,
            funct3::SLT => Slti,
            funct3::SLTU => Sltiu,
            funct3::XOR => Xori,
            funct3::OR => Ori,
            funct3::AND => Andi,
            funct3::SLL if word.funct6() == 0 => Slli,
            funct3::SRL_SRA if word.funct6() == 0 => Srli,
            funct3::SRL_SRA if word.funct6() == funct7::SRAI_FUNCT6 => Srai,
            _ => Undefined,
        },
        opcodes::OP_IMM_32 => match (f7, f3) {
            (_, funct3::ADD_SUB) => Addiw,
            (funct7::BASE, funct3::SLL) => Slliw,
            (funct7::BASE, funct3::SRL_SRA) => Srliw,
            (funct7::ALT, funct3::SRL_SRA) => Sraiw,
            _ => Undefined,
        },
        opcodes::OP_REG => match (f7, f3) {
            (funct7::BASE, funct3::ADD_SUB) => Add,
            (funct7::ALT, funct3::ADD_SUB) => Sub,
            (funct7::BASE, funct3::SLL) => Sll,
            (funct7::BASE, funct3::SLT) => Slt,
            (funct7::BASE, funct3::SLTU) => Sltu,
            (funct7::BASE, funct3::XOR) => Xor,
            (funct7::BASE, funct3::SRL_SRA) => Srl,
            (funct7::ALT, funct3::SRL_SRA) => Sra,
            (funct7::BASE, funct3::OR) => Or,
            (funct7::BASE, funct3::AND) => And,
            (funct7::MULDIV, funct3::MUL) => Mul,
            (funct7::MULDIV, funct3::MULH) => Mulh,
            (funct7::MULDIV, funct3::MULHSU) => Mulhsu,
            (funct7::MULDIV, funct3::MULHU) => Mulhu,
            (funct7::MULDIV, funct3::DIV) => Div,
            (funct7::MULDIV, funct3::DIVU) => Divu,
            (funct7::MULDIV, funct3::REM) => Rem,
            (funct7::MULDIV, funct3::REMU) => Remu,
            _ => Undefined,
        },
        opcodes::OP_REG_32 => match (f7, f3) {
            (funct7::BASE, funct3::ADD_SUB) => Addw,
            (funct7::ALT, funct3::ADD_SUB) => Subw,
            (funct7::BASE, funct3::SLL) => Sllw,
            (funct7::BASE, funct3::SRL_SRA) => Srlw,
            (funct7::ALT, funct3::SRL_SRA) => Sraw,
            (funct7::MULDIV, funct3::MUL) => Mulw,
            (funct7::MULDIV, funct3::DIV) => Divw,
            (funct7::MULDIV, funct3::DIVU) => Divuw,
            (funct7::MULDIV, funct3::REM) => Remw,
            (funct7::MULDIV, funct3::REMU) => Remuw,
            _ => Undefined,
        },
        opcodes::OP_MISC_MEM if f3 == funct3::FENCE || f3 == funct3::FENCE_I => Fence,
        opcodes::OP_SYSTEM => match word {
            super::fields::ECALL => Ecall,
            super::fields::EBREAK => Ebreak,
            _ => Undefined,
        },
        _ => Undefined,
    }
}
