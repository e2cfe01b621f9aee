//! Instruction Set Architecture (ISA) model.
//!
//! The pure collaborators every pipeline stage leans on:
//!
//! * `fields`: opcode and function-code tables, and bit-field accessors.
//! * `opcode`: the closed `Opcode` enum and its classification helpers.
//! * `instruction`: the in-flight `Instruction` record.
//! * `decode` / `encode`: bytes to records and back.
//! * `rvc`: compressed (16-bit) instruction expansion.
//! * `execute`: opcode and operands to outcome.
//! * `syscall`: the Linux syscall proxy driven by ECALL.
//!
//! Supported: RV64I, RV64M and the integer subset of RVC.

/// Instruction decoding from byte windows.
pub mod decode;

/// Instruction encoding, the inverse of decoding.
pub mod encode;

/// Pure execute model.
pub mod execute;

/// Opcode and function-code constants, and field extraction.
pub mod fields;

/// The in-flight instruction record.
pub mod instruction;

/// Operation mnemonics.
pub mod opcode;

/// Compressed instruction expansion.
pub mod rvc;

/// Syscall proxy trait and Linux implementation.
pub mod syscall;

pub use instruction::{Confirmation, InsnRef, Instruction, Prediction};
pub use opcode::Opcode;
