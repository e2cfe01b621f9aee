//! Compressed instruction expansion.
//!
//! Each 16-bit RVC parcel maps to exactly one 32-bit instruction; [`expand`] returns
//! that word so the ordinary decoder can take it from there. Reserved encodings and
//! the floating-point loads/stores (C.FLD, C.FSD, C.FLDSP, C.FSDSP) expand to `0`,
//! which the decoder reports as undefined.

use super::fields::{EBREAK, funct3, funct7, opcodes};

/// Quadrant 0 (bits 1:0 = 00).
const QUADRANT_0: u16 = 0b00;
/// Quadrant 1 (bits 1:0 = 01).
const QUADRANT_1: u16 = 0b01;
/// Quadrant 2 (bits 1:0 = 10).
const QUADRANT_2: u16 = 0b10;

/// Stack pointer (x2).
const SP: u32 = 2;
/// Return address (x1).
const RA: u32 = 1;

/// Extracts `len` bits of `inst` starting at `lo`.
#[inline]
fn bits(inst: u16, lo: u32, len: u32) -> u32 {
    (u32::from(inst) >> lo) & ((1 << len) - 1)
}

/// Full 5-bit register field at bits 11:7.
#[inline]
fn rd_full(inst: u16) -> u32 {
    bits(inst, 7, 5)
}

/// Full 5-bit register field at bits 6:2.
#[inline]
fn rs2_full(inst: u16) -> u32 {
    bits(inst, 2, 5)
}

/// Popular register (x8..x15) at bits 9:7.
#[inline]
fn rs1_prime(inst: u16) -> u32 {
    8 + bits(inst, 7, 3)
}

/// Popular register (x8..x15) at bits 4:2.
#[inline]
fn rs2_prime(inst: u16) -> u32 {
    8 + bits(inst, 2, 3)
}

/// Sign-extends the low `width` bits of `val`.
#[inline]
fn sext(val: u32, width: u32) -> u32 {
    let shift = 32 - width;
    (((val << shift) as i32) >> shift) as u32
}

/// 6-bit signed immediate `imm[5] = bit 12, imm[4:0] = bits 6:2`.
#[inline]
fn ci_imm(inst: u16) -> u32 {
    sext(bits(inst, 12, 1) << 5 | bits(inst, 2, 5), 6)
}

fn i_type(imm: u32, rs1: u32, f3: u32, rd: u32, op: u32) -> u32 {
    ((imm & 0xfff) << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | op
}

fn r_type(f7: u32, rs2: u32, rs1: u32, f3: u32, rd: u32, op: u32) -> u32 {
    (f7 << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | (rd << 7) | op
}

fn s_type(imm: u32, rs2: u32, rs1: u32, f3: u32) -> u32 {
    ((imm >> 5) << 25) | (rs2 << 20) | (rs1 << 15) | (f3 << 12) | ((imm & 0x1f) << 7) | opcodes::OP_STORE
}

fn b_type(offset: u32, rs1: u32, f3: u32) -> u32 {
    let b12 = (offset >> 12) & 1;
    let b11 = (offset >> 11) & 1;
    let b10_5 = (offset >> 5) & 0x3f;
    let b4_1 = (offset >> 1) & 0xf;
    (b12 << 31) | (b10_5 << 25) | (rs1 << 15) | (f3 << 12) | (b4_1 << 8) | (b11 << 7) | opcodes::OP_BRANCH
}

fn j_type(offset: u32, rd: u32) -> u32 {
    let b20 = (offset >> 20) & 1;
    let b19_12 = (offset >> 12) & 0xff;
    let b11 = (offset >> 11) & 1;
    let b10_1 = (offset >> 1) & 0x3ff;
    (b20 << 31) | (b10_1 << 21) | (b11 << 20) | (b19_12 << 12) | (rd << 7) | opcodes::OP_JAL
}

/// Expands a 16-bit RVC parcel into its 32-bit equivalent, or `0` if reserved.
pub fn expand(inst: u16) -> u32 {
    let f3 = bits(inst, 13, 3);
    match inst & 0x3 {
        QUADRANT_0 => quadrant0(inst, f3),
        QUADRANT_1 => quadrant1(inst, f3),
        QUADRANT_2 => quadrant2(inst, f3),
        _ => 0,
    }
}

fn quadrant0(inst: u16, f3: u32) -> u32 {
    // nzuimm[5:4|9:6|2|3] for C.ADDI4SPN; uimm[5:3|2|6] for words; uimm[5:3|7:6] for doubles
    let word_off = bits(inst, 6, 1) << 2 | bits(inst, 10, 3) << 3 | bits(inst, 5, 1) << 6;
    let dword_off = bits(inst, 10, 3) << 3 | bits(inst, 5, 2) << 6;
    let rs1 = rs1_prime(inst);
    let r2 = rs2_prime(inst);
    match f3 {
        0b000 => {
            let imm = bits(inst, 6, 1) << 2
                | bits(inst, 5, 1) << 3
                | bits(inst, 11, 2) << 4
                | bits(inst, 7, 4) << 6;
            if imm == 0 {
                return 0;
            }
            i_type(imm, SP, funct3::ADD_SUB, r2, opcodes::OP_IMM)
        }
        0b010 => i_type(word_off, rs1, funct3::LW, r2, opcodes::OP_LOAD),
        0b011 => i_type(dword_off, rs1, funct3::LD, r2, opcodes::OP_LOAD),
        0b110 => s_type(word_off, r2, rs1, funct3::SW),
        0b111 => s_type(dword_off, r2, rs1, funct3::SD),
        // C.FLD, C.FSD and the reserved slot
        _ => 0,
    }
}

fn quadrant1(inst: u16, f3: u32) -> u32 {
    let rd = rd_full(inst);
    match f3 {
        0b000 => i_type(ci_imm(inst), rd, funct3::ADD_SUB, rd, opcodes::OP_IMM),
        0b001 => {
            if rd == 0 {
                return 0;
            }
            i_type(ci_imm(inst), rd, funct3::ADD_SUB, rd, opcodes::OP_IMM_32)
        }
        0b010 => i_type(ci_imm(inst), 0, funct3::ADD_SUB, rd, opcodes::OP_IMM),
        0b011 if rd == SP => {
            let imm = sext(
                bits(inst, 6, 1) << 4
                    | bits(inst, 2, 1) << 5
                    | bits(inst, 5, 1) << 6
                    | bits(inst, 3, 2) << 7
                    | bits(inst, 12, 1) << 9,
                10,
            );
            if imm == 0 {
                return 0;
            }
            i_type(imm, SP, funct3::ADD_SUB, SP, opcodes::OP_IMM)
        }
        0b011 => {
            let imm = ci_imm(inst);
            if imm == 0 {
                return 0;
            }
            (imm << 12) | (rd << 7) | opcodes::OP_LUI
        }
        0b100 => misc_alu(inst),
        0b101 => {
            let offset = sext(
                bits(inst, 3, 3) << 1
                    | bits(inst, 11, 1) << 4
                    | bits(inst, 2, 1) << 5
                    | bits(inst, 7, 1) << 6
                    | bits(inst, 6, 1) << 7
                    | bits(inst, 9, 2) << 8
                    | bits(inst, 8, 1) << 10
                    | bits(inst, 12, 1) << 11,
                12,
            );
            j_type(offset, 0)
        }
        _ => {
            let offset = sext(
                bits(inst, 3, 2) << 1
                    | bits(inst, 10, 2) << 3
                    | bits(inst, 2, 1) << 5
                    | bits(inst, 5, 2) << 6
                    | bits(inst, 12, 1) << 8,
                9,
            );
            let cond = if f3 == 0b110 { funct3::BEQ } else { funct3::BNE };
            b_type(offset, rs1_prime(inst), cond)
        }
    }
}

/// C.SRLI, C.SRAI, C.ANDI and the register-register group.
fn misc_alu(inst: u16) -> u32 {
    let rd = rs1_prime(inst);
    let shamt = bits(inst, 12, 1) << 5 | bits(inst, 2, 5);
    match bits(inst, 10, 2) {
        0b00 => i_type(shamt, rd, funct3::SRL_SRA, rd, opcodes::OP_IMM),
        0b01 => i_type(funct7::SRAI_FUNCT6 << 6 | shamt, rd, funct3::SRL_SRA, rd, opcodes::OP_IMM),
        0b10 => i_type(ci_imm(inst), rd, funct3::AND, rd, opcodes::OP_IMM),
        _ => {
            let rs2 = rs2_prime(inst);
            let (f7, f3, op) = match (bits(inst, 12, 1), bits(inst, 5, 2)) {
                (0, 0b00) => (funct7::ALT, funct3::ADD_SUB, opcodes::OP_REG),
                (0, 0b01) => (funct7::BASE, funct3::XOR, opcodes::OP_REG),
                (0, 0b10) => (funct7::BASE, funct3::OR, opcodes::OP_REG),
                (0, 0b11) => (funct7::BASE, funct3::AND, opcodes::OP_REG),
                (1, 0b00) => (funct7::ALT, funct3::ADD_SUB, opcodes::OP_REG_32),
                (1, 0b01) => (funct7::BASE, funct3::ADD_SUB, opcodes::OP_REG_32),
                _ => return 0,
            };
            r_type(f7, rs2, rd, f3, rd, op)
        }
    }
}

fn quadrant2(inst: u16, f3: u32) -> u32 {
    let rd = rd_full(inst);
    let rs2 = rs2_full(inst);
    match f3 {
        0b000 => {
            if rd == 0 {
                return 0;
            }
            let shamt = bits(inst, 12, 1) << 5 | bits(inst, 2, 5);
            i_type(shamt, rd, funct3::SLL, rd, opcodes::OP_IMM)
        }
        0b010 => {
            if rd == 0 {
                return 0;
            }
            let imm = bits(inst, 12, 1) << 5 | bits(inst, 4, 3) << 2 | bits(inst, 2, 2) << 6;
            i_type(imm, SP, funct3::LW, rd, opcodes::OP_LOAD)
        }
        0b011 => {
            if rd == 0 {
                return 0;
            }
            let imm = bits(inst, 12, 1) << 5 | bits(inst, 5, 2) << 3 | bits(inst, 2, 3) << 6;
            i_type(imm, SP, funct3::LD, rd, opcodes::OP_LOAD)
        }
        0b100 => match (bits(inst, 12, 1), rd, rs2) {
            (0, 0, 0) => 0,
            (0, _, 0) => i_type(0, rd, 0, 0, opcodes::OP_JALR),
            (0, _, _) => r_type(funct7::BASE, rs2, 0, funct3::ADD_SUB, rd, opcodes::OP_REG),
            (_, 0, 0) => EBREAK,
            (_, _, 0) => i_type(0, rd, 0, RA, opcodes::OP_JALR),
            _ => r_type(funct7::BASE, rs2, rd, funct3::ADD_SUB, rd, opcodes::OP_REG),
        },
        0b110 => {
            let imm = bits(inst, 9, 4) << 2 | bits(inst, 7, 2) << 6;
            s_type(imm, rs2, SP, funct3::SW)
        }
        0b111 => {
            let imm = bits(inst, 10, 3) << 3 | bits(inst, 7, 3) << 6;
            s_type(imm, rs2, SP, funct3::SD)
        }
        // C.FLDSP, C.FSDSP
        _ => 0,
    }
}
