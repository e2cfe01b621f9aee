//! Execute model.
//!
//! A pure function from a decoded instruction with resolved operands to its
//! outcome. Loads and stores only get their effective address here; ECALL is
//! driven by the ALU stage through the syscall proxy.

use super::instruction::Instruction;
use super::opcode::{Format, Opcode};
use crate::core::units::alu::{Alu, AluOp};

/// What executing an instruction produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Value for `rd`.
    pub result: Option<u64>,
    /// Realized next PC of a branch or jump.
    pub next_pc: Option<u64>,
    /// Link address of JAL/JALR.
    pub ret_pc: Option<u64>,
    /// Branch outcome (always `true` for jumps).
    pub taken: Option<bool>,
    /// Effective address of a load or store.
    pub addr: Option<u64>,
}

impl Outcome {
    /// Copies the outcome into the instruction record.
    pub fn apply(self, insn: &mut Instruction) {
        insn.result = self.result;
        insn.next_pc = self.next_pc;
        insn.ret_pc = self.ret_pc;
        insn.taken = self.taken;
        insn.addr = self.addr;
    }
}

/// Executes `insn` against its resolved operands.
///
/// Missing operands read as zero; callers only execute ready instructions.
///
/// # Examples
///
/// ```
/// use nebula_core::isa::decode::decode_word;
/// use nebula_core::isa::execute::execute;
///
/// // addi x1, x0, 5
/// let mut insn = decode_word(0x0050_0093, 0x1000);
/// insn.operands.insert(0, 0);
/// assert_eq!(execute(&insn).result, Some(5));
/// ```
pub fn execute(insn: &Instruction) -> Outcome {
    let rs1 = insn.operand(insn.rs1).unwrap_or(0);
    let rs2 = insn.operand(insn.rs2).unwrap_or(0);
    let imm = insn.imm.unwrap_or(0) as u64;
    let pc = insn.pc;
    let link = insn.fallthrough();

    match insn.cmd {
        Opcode::Lui => Outcome {
            result: Some(imm),
            ..Outcome::default()
        },
        Opcode::Auipc => Outcome {
            result: Some(pc.wrapping_add(imm)),
            ..Outcome::default()
        },
        Opcode::Jal => Outcome {
            next_pc: Some(pc.wrapping_add(imm)),
            ret_pc: Some(link),
            taken: Some(true),
            ..Outcome::default()
        },
        Opcode::Jalr => Outcome {
            next_pc: Some(rs1.wrapping_add(imm) & !1),
            ret_pc: Some(link),
            taken: Some(true),
            ..Outcome::default()
        },
        cmd if cmd.is_branch() => {
            let taken = branch_taken(cmd, rs1, rs2);
            Outcome {
                next_pc: Some(if taken { pc.wrapping_add(imm) } else { link }),
                taken: Some(taken),
                ..Outcome::default()
            }
        }
        cmd if cmd.is_memory() => Outcome {
            addr: Some(rs1.wrapping_add(imm)),
            ..Outcome::default()
        },
        cmd => match AluOp::for_opcode(cmd) {
            Some((op, width)) => {
                let b = match cmd.format() {
                    Format::R => rs2,
                    Format::Shift | Format::ShiftW => u64::from(insn.shamt.unwrap_or(0)),
                    _ => imm,
                };
                Outcome {
                    result: Some(Alu::execute(op, rs1, b, width)),
                    ..Outcome::default()
                }
            }
            None => Outcome::default(),
        },
    }
}

fn branch_taken(cmd: Opcode, a: u64, b: u64) -> bool {
    match cmd {
        Opcode::Beq => a == b,
        Opcode::Bne => a != b,
        Opcode::Blt => (a as i64) < (b as i64),
        Opcode::Bge => (a as i64) >= (b as i64),
        Opcode::Bltu => a < b,
        Opcode::Bgeu => a >= b,
        _ => false,
    }
}
