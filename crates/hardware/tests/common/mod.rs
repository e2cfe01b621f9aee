//! Shared test infrastructure.
//!
//! - **Assembler**: builds small RV64 programs from readable helpers.
//! - **Harness**: runs programs end to end and records what crossed the message bus.

/// Word-level assembler for test programs.
pub mod asm;

/// Run helpers and the recording probe component.
pub mod harness;
