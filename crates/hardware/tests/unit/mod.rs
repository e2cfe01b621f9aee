//! # Unit Components
//!
//! Tests grouped by subsystem, from the leaf structures up to complete runs.

/// Branch target address cache and direction counters.
pub mod bru;

/// Set-associative cache: geometry, replacement, pokes and invalidation.
pub mod cache;

/// Configuration parsing, validation and runtime patching.
pub mod config;


/// Decode, encode, compressed expansion and the execute model.
pub mod isa;

/// Frame allocation, translation and the TLB.
pub mod mmu;

/// Whole programs through the full pipeline.
///
/// Covers the retirement contract, mispredict recovery under both branch
/// resolution modes, the memory path, multi-core runs and termination.
pub mod pipeline;

/// Snapshot capture, periodic checkpoints and restore equivalence.
pub mod snapshot;

/// Statistics reporting through the collector.
pub mod stats;

/// ECALL handling through the syscall proxy, including a mocked proxy.
pub mod syscalls;

/// Fixed-size frame codec.
pub mod wire;
