//! Addition, subtraction and the M extension.
//!
//! Division follows the RISC-V rules rather than trapping: dividing by zero
//! yields all ones (quotient) or the dividend (remainder), and signed overflow
//! (`MIN / -1`) yields `MIN` with remainder 0.

use super::{AluOp, Width};

/// Executes an arithmetic operation; `0` for any other op.
pub fn execute(op: AluOp, a: u64, b: u64, width: Width) -> u64 {
    match width {
        Width::Double => double(op, a, b),
        Width::Word => word(op, a as u32, b as u32) as i32 as i64 as u64,
    }
}

fn double(op: AluOp, a: u64, b: u64) -> u64 {
    let (sa, sb) = (a as i64, b as i64);
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Mulh => ((i128::from(sa) * i128::from(sb)) >> 64) as u64,
        // signed a, unsigned b
        AluOp::Mulhsu => ((i128::from(sa) * i128::from(b)) >> 64) as u64,
        AluOp::Mulhu => ((u128::from(a) * u128::from(b)) >> 64) as u64,
        AluOp::Div if b == 0 => u64::MAX,
        AluOp::Div => sa.wrapping_div(sb) as u64,
        AluOp::Divu => a.checked_div(b).unwrap_or(u64::MAX),
        AluOp::Rem if b == 0 => a,
        AluOp::Rem => sa.wrapping_rem(sb) as u64,
        AluOp::Remu => a.checked_rem(b).unwrap_or(a),
        _ => 0,
    }
}

fn word(op: AluOp, a: u32, b: u32) -> u32 {
    let (sa, sb) = (a as i32, b as i32);
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Div if b == 0 => u32::MAX,
        AluOp::Div => sa.wrapping_div(sb) as u32,
        AluOp::Divu => a.checked_div(b).unwrap_or(u32::MAX),
        AluOp::Rem if b == 0 => a,
        AluOp::Rem => sa.wrapping_rem(sb) as u32,
        AluOp::Remu => a.checked_rem(b).unwrap_or(a),
        // no MULH*W in RV64M
        _ => 0,
    }
}
