//! Arithmetic Logic Unit (ALU).
//!
//! Integer arithmetic for the execute model. Operations are organized into
//! submodules by category:
//! - [`arithmetic`]: Add, Sub and the M extension (Mul*, Div*, Rem*)
//! - [`logic`]:      Or, And, Xor, Slt, Sltu
//! - [`shifts`]:     Sll, Srl, Sra
//!
//! The `W` (32-bit) variants operate on the low word and sign-extend the result.

/// Integer arithmetic operations (add, subtract, multiply, divide).
pub mod arithmetic;

/// Bitwise logical and comparison operations.
pub mod logic;

/// Shift operations.
pub mod shifts;

use crate::isa::opcode::Opcode;

/// Integer ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Shift left logical.
    Sll,
    /// Set less than (signed).
    Slt,
    /// Set less than (unsigned).
    Sltu,
    /// Bitwise XOR.
    Xor,
    /// Shift right logical.
    Srl,
    /// Shift right arithmetic.
    Sra,
    /// Bitwise OR.
    Or,
    /// Bitwise AND.
    And,
    /// Low product.
    Mul,
    /// High product, signed x signed.
    Mulh,
    /// High product, signed x unsigned.
    Mulhsu,
    /// High product, unsigned x unsigned.
    Mulhu,
    /// Signed division.
    Div,
    /// Unsigned division.
    Divu,
    /// Signed remainder.
    Rem,
    /// Unsigned remainder.
    Remu,
}

/// Operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Full 64-bit operation.
    Double,
    /// 32-bit `W` operation, result sign-extended from bit 31.
    Word,
}

impl AluOp {
    /// ALU operation and width of a register-register or register-immediate opcode.
    ///
    /// Returns `None` for opcodes that do not go through the integer datapath
    /// (control flow, memory, system).
    pub const fn for_opcode(cmd: Opcode) -> Option<(Self, Width)> {
        use Opcode::*;
        use Width::{Double, Word};
        let pair = match cmd {
            Add | Addi => (Self::Add, Double),
            Sub => (Self::Sub, Double),
            Sll | Slli => (Self::Sll, Double),
            Slt | Slti => (Self::Slt, Double),
            Sltu | Sltiu => (Self::Sltu, Double),
            Xor | Xori => (Self::Xor, Double),
            Srl | Srli => (Self::Srl, Double),
            Sra | Srai => (Self::Sra, Double),
            Or | Ori => (Self::Or, Double),
            And | Andi => (Self::And, Double),
            Addw | Addiw => (Self::Add, Word),
            Subw => (Self::Sub, Word),
            Sllw | Slliw => (Self::Sll, Word),
            Srlw | Srliw => (Self::Srl, Word),
            Sraw | Sraiw => (Self::Sra, Word),
            Mul => (Self::Mul, Double),
            Mulh => (Self::Mulh, Double),
            Mulhsu => (Self::Mulhsu, Double),
            Mulhu => (Self::Mulhu, Double),
            Div => (Self::Div, Double),
            Divu => (Self::Divu, Double),
            Rem => (Self::Rem, Double),
            Remu => (Self::Remu, Double),
            Mulw => (Self::Mul, Word),
            Divw => (Self::Div, Word),
            Divuw => (Self::Divu, Word),
            Remw => (Self::Rem, Word),
            Remuw => (Self::Remu, Word),
            _ => return None,
        };
        Some(pair)
    }
}

/// Arithmetic Logic Unit (ALU) for integer operations.
pub struct Alu;

impl Alu {
    /// Executes an integer ALU operation.
    ///
    /// # Examples
    ///
    /// ```
    /// use nebula_core::core::units::alu::{Alu, AluOp, Width};
    ///
    /// assert_eq!(Alu::execute(AluOp::Add, 42, 8, Width::Double), 50);
    /// // 32-bit addition wraps and sign-extends
    /// assert_eq!(Alu::execute(AluOp::Add, 0x7fff_ffff, 1, Width::Word), 0xffff_ffff_8000_0000);
    /// assert_eq!(Alu::execute(AluOp::Slt, -5_i64 as u64, 10, Width::Double), 1);
    /// assert_eq!(Alu::execute(AluOp::Divu, 100, 0, Width::Double), u64::MAX);
    /// ```
    pub fn execute(op: AluOp, a: u64, b: u64, width: Width) -> u64 {
        match op {
            AluOp::Add
            | AluOp::Sub
            | AluOp::Mul
            | AluOp::Mulh
            | AluOp::Mulhsu
            | AluOp::Mulhu
            | AluOp::Div
            | AluOp::Divu
            | AluOp::Rem
            | AluOp::Remu => arithmetic::execute(op, a, b, width),
            AluOp::Or | AluOp::And | AluOp::Xor | AluOp::Slt | AluOp::Sltu => {
                logic::execute(op, a, b)
            }
            AluOp::Sll | AluOp::Srl | AluOp::Sra => shifts::execute(op, a, b, width),
        }
    }
}
