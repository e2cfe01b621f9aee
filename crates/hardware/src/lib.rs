//! Nebula: a distributed, cycle-accurate RISC-V pipeline simulator.
//!
//! Every pipeline stage, cache level, predictor and memory unit is an independent
//! component running on its own thread. Components never share state; they trade
//! typed envelopes through a central coordinator that advances simulated time in
//! lock-step. This crate provides:
//! 1. **Simulation:** Message model, wire codec, coordinator, component host, loader and snapshots.
//! 2. **Core:** Fetch, decode, issue, execute, load/store, commit and branch-prediction stages.
//! 3. **Units:** Set-associative cache, MMU/TLB, branch predictor structures and ALU arithmetic.
//! 4. **SoC:** Register file, shared L2 cache and main memory components.
//! 5. **ISA:** RV64IM + RVC decode, encode and execute, plus the Linux syscall proxy.

/// Common types and constants (register names, errors, reserved addresses).
pub mod common;
/// Simulator configuration (defaults, per-component sections, runtime patching).
pub mod config;
/// Pipeline stage components and the hardware units they are built from.
pub mod core;
/// Instruction set (decode, encode, execute, compressed expansion, syscalls).
pub mod isa;
/// Coordinator, component host, messages, loader, snapshots and watchdog.
pub mod sim;
/// Shared memory-side components (register file, L2, main memory).
pub mod soc;
/// Statistics counters and the stats collector component.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Builder and driver for a complete simulation.
pub use crate::sim::simulator::{RunReport, Simulation, StopReason};
