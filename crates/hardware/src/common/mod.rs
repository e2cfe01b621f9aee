//! Common utilities and types shared by every component.
//!
//! This module provides the building blocks that cross component boundaries:
//! 1. **Constants:** Frame size, reserved snapshot addresses and register numbering.
//! 2. **Error Handling:** Protocol, wire, loader and configuration error types.
//! 3. **Register Names:** The `%pc`/`xN`/`fN` naming used on the wire.

/// Common constants used throughout the simulator.
pub mod constants;

/// Error types for protocol violations, framing, loading and configuration.
pub mod error;

/// Architectural register naming.
pub mod reg;

pub use error::{ConfigError, LoadError, ProtocolError, SimError, WireError};
pub use reg::RegName;

/// Simulated clock cycle.
pub type Cycle = u64;

/// Identifier of a simulated core.
pub type CoreId = usize;
