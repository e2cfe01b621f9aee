//! Shift operations.
//!
//! Shift amounts are masked to 6 bits for 64-bit shifts and 5 bits for the `W`
//! forms; `W` results are sign-extended from bit 31.

use super::{AluOp, Width};

/// Shift-amount mask for 64-bit shifts.
const SHAMT_MASK_64: u32 = 0x3f;

/// Shift-amount mask for 32-bit shifts.
const SHAMT_MASK_32: u32 = 0x1f;

/// Executes a shift; `0` for any other op.
pub fn execute(op: AluOp, a: u64, b: u64, width: Width) -> u64 {
    match width {
        Width::Double => {
            let sh = b as u32 & SHAMT_MASK_64;
            match op {
                AluOp::Sll => a << sh,
                AluOp::Srl => a >> sh,
                AluOp::Sra => ((a as i64) >> sh) as u64,
                _ => 0,
            }
        }
        Width::Word => {
            let sh = b as u32 & SHAMT_MASK_32;
            let w = match op {
                AluOp::Sll => (a as u32) << sh,
                AluOp::Srl => (a as u32) >> sh,
                AluOp::Sra => ((a as i32) >> sh) as u32,
                _ => return 0,
            };
            w as i32 as i64 as u64
        }
    }
}
