//! Error definitions.
//!
//! This module defines the error taxonomy of the simulator. It provides:
//! 1. **Protocol Violations:** Fatal breaches of the tick protocol (late arrivals, restore while
//!    running, unknown config fields, faulted components).
//! 2. **Wire Errors:** Framing failures of the fixed-size text encoding.
//! 3. **Loader and Configuration Errors:** Problems with ELF images and config files.
//! 4. **Top-level Error:** `SimError`, which every public entry point returns.
//!
//! Undefined instructions, cache misses and watchdog trips are *not* errors; they are
//! reported through the message protocol and the run continues or halts gracefully.

use std::path::PathBuf;

use thiserror::Error;

use super::{CoreId, Cycle};

/// Framing failures of the fixed-size wire encoding.
#[derive(Error, Debug)]
pub enum WireError {
    /// The encoded message does not fit in one frame.
    #[error("message ({len} B) too big for a {cap} B frame")]
    Oversize {
        /// Encoded length in bytes.
        len: usize,
        /// Frame capacity in bytes.
        cap: usize,
    },

    /// The frame is not exactly one frame long.
    #[error("frame is {0} B, expected exactly one frame")]
    BadLength(usize),

    /// Serialization failed.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame holds something other than one well-formed message.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Fatal violations of the component protocol.
///
/// Any of these aborts the offending component and terminates the run.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An envelope was scheduled for the current cycle or the past.
    #[error("{service} scheduled an envelope for cycle {arrival} during cycle {cycle}")]
    ArrivalNotInFuture {
        /// Component that emitted the envelope.
        service: String,
        /// Requested arrival cycle.
        arrival: Cycle,
        /// Cycle being processed.
        cycle: Cycle,
    },

    /// A component acknowledged a cycle other than the one being processed.
    #[error("{service} acknowledged cycle {acked} while cycle {cycle} is in flight")]
    StrayAck {
        /// Component that acknowledged.
        service: String,
        /// Cycle in the acknowledgment.
        acked: Cycle,
        /// Cycle being processed.
        cycle: Cycle,
    },

    /// A `config` message named a field the service does not have.
    #[error("no such config field, {field}, in service {service}")]
    UnknownConfigField {
        /// Service addressed.
        service: String,
        /// Field requested.
        field: String,
    },

    /// A `config` message carried a value of the wrong type.
    #[error("invalid value for {service}.{field}: {reason}")]
    InvalidConfigValue {
        /// Service addressed.
        service: String,
        /// Field requested.
        field: String,
        /// Deserializer complaint.
        reason: String,
    },

    /// A `restore` arrived while the component was running.
    #[error("attempted restore while running ({service})")]
    RestoreWhileRunning {
        /// Component that received the restore.
        service: String,
    },

    /// A snapshot could not be written or read back.
    #[error("snapshot {path}: {reason}")]
    Snapshot {
        /// Snapshot file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A component reported an internal inconsistency and aborted.
    #[error("[{coreid:?}] {service} aborted: {reason}")]
    ComponentFault {
        /// Component name.
        service: String,
        /// Core the component belongs to, if any.
        coreid: Option<CoreId>,
        /// Fault description.
        reason: String,
    },

    /// A channel closed while the run was still active.
    #[error("lost connection to {0}")]
    Disconnected(String),

    /// Framing failure on a strict-frames link.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Failures while building a process image from an ELF file.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read ELF file '{path}': {source}")]
    Io {
        /// File requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a little-endian 64-bit ELF.
    #[error("failed to parse ELF file '{path}': {reason}")]
    Parse {
        /// File requested.
        path: PathBuf,
        /// Parser complaint.
        reason: String,
    },

    /// The entry symbol is not in the symbol table.
    #[error("symbol '{0}' not found")]
    MissingSymbol(String),
}

/// Failures while reading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Io {
        /// File requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for the config tree.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range (e.g. a cache geometry that is not a power of two).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error type for the simulator.
#[derive(Error, Debug)]
pub enum SimError {
    /// A component violated the tick protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The program image could not be loaded.
    #[error("loader: {0}")]
    Load(#[from] LoadError),

    /// The configuration is unusable.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Thread or file-system failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
