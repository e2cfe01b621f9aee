//! Functional units and storage structures.
//!
//! Stateful building blocks owned by the pipeline components: the integer ALU,
//! the branch prediction tables, the set-associative cache and the MMU.

/// Arithmetic Logic Unit for integer operations.
pub mod alu;

/// Branch target address cache and saturating counters.
pub mod bru;

/// Set-associative cache with LRU and random replacement.
pub mod cache;

/// Frame allocator, translation table and TLB.
pub mod mmu;
