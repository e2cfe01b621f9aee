//! The closed set of operations the pipeline understands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Instruction encoding format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Register-register: `rd, rs1, rs2`.
    R,
    /// Register-immediate: `rd, rs1, imm`.
    I,
    /// 64-bit shift by immediate: `rd, rs1, shamt` (6-bit).
    Shift,
    /// 32-bit shift by immediate: `rd, rs1, shamt` (5-bit).
    ShiftW,
    /// Store: `rs1, rs2, imm`.
    S,
    /// Conditional branch: `rs1, rs2, imm`.
    B,
    /// Upper immediate: `rd, imm`.
    U,
    /// Jump: `rd, imm`.
    J,
    /// No register or immediate fields.
    Bare,
}

/// Extension applied to load data at retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Sign-extend from the access width.
    Signed,
    /// Zero-extend from the access width.
    Unsigned,
}

/// Operation mnemonic.
///
/// Serialized as the upper-case mnemonic (`"ADDI"`, `"SRAIW"`, ...).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Ld,
    Lbu,
    Lhu,
    Lwu,
    Sb,
    Sh,
    Sw,
    Sd,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Addiw,
    Slliw,
    Srliw,
    Sraiw,
    Addw,
    Subw,
    Sllw,
    Srlw,
    Sraw,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    Mulw,
    Divw,
    Divuw,
    Remw,
    Remuw,
    Fence,
    Ecall,
    Ebreak,
    Nop,
    /// Any word the decoder does not recognize.
    Undefined,
}

impl Opcode {
    /// Encoding format of the operation.
    pub const fn format(self) -> Format {
        use Opcode::*;
        match self {
            Lui | Auipc => Format::U,
            Jal => Format::J,
            Jalr | Lb | Lh | Lw | Ld | Lbu | Lhu | Lwu | Addi | Slti | Sltiu | Xori | Ori
            | Andi | Addiw => Format::I,
            Beq | Bne | Blt | Bge | Bltu | Bgeu => Format::B,
            Sb | Sh | Sw | Sd => Format::S,
            Slli | Srli | Srai => Format::Shift,
            Slliw | Srliw | Sraiw => Format::ShiftW,
            Add | Sub | Sll | Slt | Sltu | Xor | Srl | Sra | Or | And | Addw | Subw | Sllw
            | Srlw | Sraw | Mul | Mulh | Mulhsu | Mulhu | Div | Divu | Rem | Remu | Mulw
            | Divw | Divuw | Remw | Remuw => Format::R,
            Fence | Ecall | Ebreak | Nop | Undefined => Format::Bare,
        }
    }

    /// Is this a load?
    pub const fn is_load(self) -> bool {
        matches!(
            self,
            Self::Lb | Self::Lh | Self::Lw | Self::Ld | Self::Lbu | Self::Lhu | Self::Lwu
        )
    }

    /// Is this a store?
    pub const fn is_store(self) -> bool {
        matches!(self, Self::Sb | Self::Sh | Self::Sw | Self::Sd)
    }

    /// Does this operation go through the LSU?
    pub const fn is_memory(self) -> bool {
        self.is_load() || self.is_store()
    }

    /// Conditional branch?
    pub const fn is_branch(self) -> bool {
        matches!(self.format(), Format::B)
    }

    /// Unconditional jump?
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jal | Self::Jalr)
    }

    /// Any instruction that may redirect control flow.
    pub const fn is_control(self) -> bool {
        self.is_branch() || self.is_jump()
    }

    /// ECALL and FENCE issue alone: they wait for the pipeline to drain
    /// and block younger instructions until they retire.
    pub const fn is_serializing(self) -> bool {
        matches!(self, Self::Ecall | Self::Fence)
    }

    /// Access width in bytes for loads and stores.
    pub const fn access_width(self) -> Option<u64> {
        match self {
            Self::Lb | Self::Lbu | Self::Sb => Some(1),
            Self::Lh | Self::Lhu | Self::Sh => Some(2),
            Self::Lw | Self::Lwu | Self::Sw => Some(4),
            Self::Ld | Self::Sd => Some(8),
            _ => None,
        }
    }

    /// How load data is widened to 64 bits.
    pub const fn extension(self) -> Option<Extension> {
        match self {
            Self::Lb | Self::Lh | Self::Lw | Self::Ld => Some(Extension::Signed),
            Self::Lbu | Self::Lhu | Self::Lwu => Some(Extension::Unsigned),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The serde name is the mnemonic.
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => f.write_str(&s),
            _ => write!(f, "{self:?}"),
        }
    }
}
