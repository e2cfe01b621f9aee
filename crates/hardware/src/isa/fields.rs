//! Instruction word layout.
//!
//! Major opcodes, `funct3`/`funct7` codes for RV64I and RV64M, and the
//! [`InstructionBits`] accessor trait used by the decoder and the encoder.

/// Major opcodes (bits 6-0).
pub mod opcodes {
    /// Loads (LB, LH, LW, LD, LBU, LHU, LWU).
    pub const OP_LOAD: u32 = 0b000_0011;
    /// FENCE and FENCE.I.
    pub const OP_MISC_MEM: u32 = 0b000_1111;
    /// Register-immediate arithmetic (ADDI, SLLI, ...).
    pub const OP_IMM: u32 = 0b001_0011;
    /// AUIPC.
    pub const OP_AUIPC: u32 = 0b001_0111;
    /// 32-bit register-immediate arithmetic (ADDIW, SLLIW, ...).
    pub const OP_IMM_32: u32 = 0b001_1011;
    /// Stores (SB, SH, SW, SD).
    pub const OP_STORE: u32 = 0b010_0011;
    /// Register-register arithmetic, including M.
    pub const OP_REG: u32 = 0b011_0011;
    /// LUI.
    pub const OP_LUI: u32 = 0b011_0111;
    /// 32-bit register-register arithmetic, including M.
    pub const OP_REG_32: u32 = 0b011_1011;
    /// Conditional branches.
    pub const OP_BRANCH: u32 = 0b110_0011;
    /// JALR.
    pub const OP_JALR: u32 = 0b110_0111;
    /// JAL.
    pub const OP_JAL: u32 = 0b110_1111;
    /// ECALL, EBREAK and the (unsupported) CSR instructions.
    pub const OP_SYSTEM: u32 = 0b111_0011;
}

/// Minor opcodes (bits 14-12).
pub mod funct3 {
    /// Load Byte.
    pub const LB: u32 = 0b000;
    /// Load Halfword.
    pub const LH: u32 = 0b001;
    /// Load Word.
    pub const LW: u32 = 0b010;
    /// Load Doubleword.
    pub const LD: u32 = 0b011;
    /// Load Byte Unsigned.
    pub const LBU: u32 = 0b100;
    /// Load Halfword Unsigned.
    pub const LHU: u32 = 0b101;
    /// Load Word Unsigned.
    pub const LWU: u32 = 0b110;

    /// Store Byte.
    pub const SB: u32 = 0b000;
    /// Store Halfword.
    pub const SH: u32 = 0b001;
    /// Store Word.
    pub const SW: u32 = 0b010;
    /// Store Doubleword.
    pub const SD: u32 = 0b011;

    /// Branch if Equal.
    pub const BEQ: u32 = 0b000;
    /// Branch if Not Equal.
    pub const BNE: u32 = 0b001;
    /// Branch if Less Than.
    pub const BLT: u32 = 0b100;
    /// Branch if Greater or Equal.
    pub const BGE: u32 = 0b101;
    /// Branch if Less Than Unsigned.
    pub const BLTU: u32 = 0b110;
    /// Branch if Greater or Equal Unsigned.
    pub const BGEU: u32 = 0b111;

    /// ADD/SUB (and ADDI, ADDW, ...).
    pub const ADD_SUB: u32 = 0b000;
    /// Shift Left Logical.
    pub const SLL: u32 = 0b001;
    /// Set Less Than.
    pub const SLT: u32 = 0b010;
    /// Set Less Than Unsigned.
    pub const SLTU: u32 = 0b011;
    /// XOR.
    pub const XOR: u32 = 0b100;
    /// Shift Right Logical/Arithmetic.
    pub const SRL_SRA: u32 = 0b101;
    /// OR.
    pub const OR: u32 = 0b110;
    /// AND.
    pub const AND: u32 = 0b111;

    /// MUL (funct7 = 1).
    pub const MUL: u32 = 0b000;
    /// MULH.
    pub const MULH: u32 = 0b001;
    /// MULHSU.
    pub const MULHSU: u32 = 0b010;
    /// MULHU.
    pub const MULHU: u32 = 0b011;
    /// DIV.
    pub const DIV: u32 = 0b100;
    /// DIVU.
    pub const DIVU: u32 = 0b101;
    /// REM.
    pub const REM: u32 = 0b110;
    /// REMU.
    pub const REMU: u32 = 0b111;

    /// FENCE.
    pub const FENCE: u32 = 0b000;
    /// FENCE.I.
    pub const FENCE_I: u32 = 0b001;
}

/// Function codes (bits 31-25).
pub mod funct7 {
    /// Base operation (ADD, SRL, ...).
    pub const BASE: u32 = 0b000_0000;
    /// Alternate operation (SUB, SRA).
    pub const ALT: u32 = 0b010_0000;
    /// M extension.
    pub const MULDIV: u32 = 0b000_0001;
    /// `funct6` (bits 31-26) of SRAI in RV64.
    pub const SRAI_FUNCT6: u32 = 0b01_0000;
}

/// ECALL instruction word.
pub const ECALL: u32 = 0x0000_0073;

/// EBREAK instruction word.
pub const EBREAK: u32 = 0x0010_0073;

/// Canonical NOP (`addi x0, x0, 0`).
pub const NOP: u32 = 0x0000_0013;

/// Field accessors on a 32-bit instruction word.
pub trait InstructionBits {
    /// Bits 6-0.
    fn opcode(&self) -> u32;
    /// Bits 11-7.
    fn rd(&self) -> u8;
    /// Bits 19-15.
    fn rs1(&self) -> u8;
    /// Bits 24-20.
    fn rs2(&self) -> u8;
    /// Bits 14-12.
    fn funct3(&self) -> u32;
    /// Bits 31-25.
    fn funct7(&self) -> u32;
    /// Bits 31-26, the RV64 shift-immediate function code.
    fn funct6(&self) -> u32;
    /// I-type immediate, sign-extended.
    fn imm_i(&self) -> i64;
    /// S-type immediate, sign-extended.
    fn imm_s(&self) -> i64;
    /// B-type immediate, sign-extended (always even).
    fn imm_b(&self) -> i64;
    /// U-type immediate, already shifted into bits 31-12 and sign-extended.
    fn imm_u(&self) -> i64;
    /// J-type immediate, sign-extended (always even).
    fn imm_j(&self) -> i64;
}

impl InstructionBits for u32 {
    #[inline]
    fn opcode(&self) -> u32 {
        self & 0x7f
    }

    #[inline]
    fn rd(&self) -> u8 {
        ((self >> 7) & 0x1f) as u8
    }

    #[inline]
    fn rs1(&self) -> u8 {
        ((self >> 15) & 0x1f) as u8
    }

    #[inline]
    fn rs2(&self) -> u8 {
        ((self >> 20) & 0x1f) as u8
    }

    #[inline]
    fn funct3(&self) -> u32 {
        (self >> 12) & 0x7
    }

    #[inline]
    fn funct7(&self) -> u32 {
        (self >> 25) & 0x7f
    }

    #[inline]
    fn funct6(&self) -> u32 {
        (self >> 26) & 0x3f
    }

    #[inline]
    fn imm_i(&self) -> i64 {
        ((*self as i32) >> 20) as i64
    }

    #[inline]
    fn imm_s(&self) -> i64 {
        let hi = ((*self as i32) >> 25) << 5;
        let lo = ((self >> 7) & 0x1f) as i32;
        (hi | lo) as i64
    }

    #[inline]
    fn imm_b(&self) -> i64 {
        let sign = ((*self as i32) >> 31) << 12;
        let b11 = ((self >> 7) & 1) << 11;
        let b10_5 = ((self >> 25) & 0x3f) << 5;
        let b4_1 = ((self >> 8) & 0xf) << 1;
        (sign | (b11 | b10_5 | b4_1) as i32) as i64
    }

    #[inline]
    fn imm_u(&self) -> i64 {
        ((self & 0xffff_f000) as i32) as i64
    }

    #[inline]
    fn imm_j(&self) -> i64 {
        let sign = ((*self as i32) >> 31) << 20;
        let b19_12 = self & 0x000f_f000;
        let b11 = ((self >> 20) & 1) << 11;
        let b10_1 = ((self >> 21) & 0x3ff) << 1;
        (sign | (b19_12 | b11 | b10_1) as i32) as i64
    }
}
