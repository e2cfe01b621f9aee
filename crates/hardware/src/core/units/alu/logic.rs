//! Bitwise and comparison operations.
//!
//! None of these has a `W` form in RV64, so they always see all 64 bits.
//! Comparisons produce 0 or 1.

use super::AluOp;

/// Executes a logical or comparison operation; `0` for any other op.
pub fn execute(op: AluOp, a: u64, b: u64) -> u64 {
    match op {
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Xor => a ^ b,
        AluOp::Slt => u64::from((a as i64) < (b as i64)),
        AluOp::Sltu => u64::from(a < b),
        _ => 0,
    }
}
