//! Simulation runtime.
//!
//! Everything that turns a set of independent components into one simulated
//! system: the message model and its wire codec, the component host that runs
//! each component on its own thread, the coordinator that advances time, the
//! program loader and checkpointing.

/// The component trait and the outbox components speak through.
pub mod component;

/// Lock-step time keeping and the termination conditions.
pub mod coordinator;

/// Envelopes scheduled for future cycles.
pub mod future;

/// ELF loading and the initial process image.
pub mod loader;

/// Messages exchanged between the coordinator and the components.
pub mod message;

/// Per-component host thread.
pub mod service;

/// Builder assembling a complete simulation.
pub mod simulator;

/// Checkpoint files.
pub mod snapshot;

/// Length-prefixed frame encoding.
pub mod wire;
