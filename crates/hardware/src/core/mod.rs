//! Processor core.
//!
//! The pipeline stages that make up one core and the hardware structures they
//! are built from.

/// Pipeline stage components (fetch through commit, branch prediction, watchdog).
pub mod pipeline;

/// Stateful units owned by the stages (ALU arithmetic, predictor tables, caches, MMU).
pub mod units;
