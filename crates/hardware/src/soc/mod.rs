//! System-on-Chip (SoC) Components.
//!
//! The components shared across the memory side of the system: the per-core
//! register files, the shared L2 cache, and main memory with its MMU and page
//! store.

/// Shared second-level cache.
pub mod l2;

/// Main memory component (page store, MMU, snapshot persistence).
pub mod mainmem;

/// Sparse page store and latency controller.
pub mod memory;

/// Per-core architectural register file.
pub mod regfile;

pub use l2::L2Cache;
pub use mainmem::MainMemory;
pub use regfile::RegisterFile;
