//! Message model.
//!
//! Everything components say to each other is one of the types here. Envelopes
//! carry a forward request ([`Event`]) or a broadcast answer ([`Response`]) plus the
//! cycle it must be delivered on; [`Message`] is the top-level unit exchanged
//! between the coordinator and a component over a link.
//!
//! The serde layout doubles as the wire format: an envelope serializes to
//! `{"arrival": 12, "coreid": 0, "fetch": {"cmd": "get", "addr": 4096}}`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{CoreId, Cycle, RegName};
use crate::isa::{InsnRef, Instruction};

/// A body scheduled for delivery on cycle `arrival`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Cycle on which the coordinator delivers the body.
    pub arrival: Cycle,
    /// Core the body concerns; `None` reaches every core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coreid: Option<CoreId>,
    /// The payload, flattened next to `arrival`.
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    /// Wraps `body` for delivery on `arrival`.
    pub const fn new(arrival: Cycle, coreid: Option<CoreId>, body: T) -> Self {
        Self {
            arrival,
            coreid,
            body,
        }
    }

    /// The envelope is addressed to `coreid` (or to every core).
    pub fn reaches(&self, coreid: Option<CoreId>) -> bool {
        match (self.coreid, coreid) {
            (Some(to), Some(me)) => to == me,
            _ => true,
        }
    }
}

/// Fetch-stage commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum FetchCmd {
    /// Fetch the block window starting at `addr`.
    Get {
        /// Virtual address.
        addr: u64,
    },
    /// Invalidate the L1 instruction cache.
    Purge,
}

/// LSU commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum LsuCmd {
    /// A load or store with its effective address resolved.
    Insn {
        /// The memory instruction.
        insn: Box<Instruction>,
    },
    /// Invalidate the L1 data cache.
    Purge,
}

/// Register-file commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum RegisterCmd {
    /// Read `name`; answered by [`Response::Register`].
    Get {
        /// Register to read.
        name: RegName,
    },
    /// Write `data` into `name`.
    Set {
        /// Register to write.
        name: RegName,
        /// New value.
        data: u64,
    },
}

/// Which address space a main-memory access names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    /// Physical frame addresses (caches, snapshots).
    #[default]
    Physical,
    /// Process virtual addresses, translated by main memory (syscalls).
    Virtual,
}

impl Space {
    /// Physical is the default and is left off the wire.
    pub fn is_physical(&self) -> bool {
        *self == Self::Physical
    }
}

/// Memory commands understood by the L2 and main memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum MemCmd {
    /// Read `size` bytes at `addr`.
    Peek {
        /// Start address.
        addr: u64,
        /// Length in bytes.
        size: u64,
        /// Address space (main memory only).
        #[serde(default, skip_serializing_if = "Space::is_physical")]
        space: Space,
    },
    /// Write `data` at `addr`.
    Poke {
        /// Start address.
        addr: u64,
        /// Bytes to write.
        data: Vec<u8>,
        /// Address space (main memory only).
        #[serde(default, skip_serializing_if = "Space::is_physical")]
        space: Space,
    },
    /// Drop every cached line.
    Purge,
    /// Drop the lines installed on behalf of `coreid`.
    Invalidate {
        /// Owning core.
        coreid: CoreId,
    },
}

/// MMU commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum MmuCmd {
    /// Translate the page holding `vaddr`.
    V2p {
        /// Virtual address.
        vaddr: u64,
    },
    /// Forget every translation of the sending core.
    Purge,
}

/// Kind of a statistics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// A plain counter.
    Flat,
    /// A histogram bucket keyed by `data`.
    Histo,
}

/// One statistics increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Reporting service.
    pub service: String,
    /// Counter or histogram.
    pub kind: StatKind,
    /// Counter name.
    pub name: String,
    /// Histogram bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Amount to add.
    #[serde(default = "one")]
    pub increment: u64,
}

const fn one() -> u64 {
    1
}

/// Performance-reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PerfCmd {
    /// Flush locally accumulated statistics to the collector.
    ReportStats,
}

/// A forward request from one component to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// To Fetch.
    Fetch(FetchCmd),
    /// Raw instruction bytes for Decode.
    Decode {
        /// Address of the first byte.
        addr: u64,
        /// Instruction bytes.
        data: Vec<u8>,
    },
    /// A decoded instruction for Issue.
    Issue {
        /// Decoded instruction.
        insn: Box<Instruction>,
    },
    /// An issued instruction for the ALU.
    Alu {
        /// Issued instruction with its known operands.
        insn: Box<Instruction>,
    },
    /// To the LSU.
    Lsu(LsuCmd),
    /// An executed instruction for Commit.
    Commit {
        /// Executed instruction.
        insn: Box<Instruction>,
    },
    /// To the register file.
    Register(RegisterCmd),
    /// To the shared L2.
    L2(MemCmd),
    /// To main memory.
    Mem(MemCmd),
    /// To the MMU (hosted by main memory).
    Mmu(MmuCmd),
    /// Program output produced by a syscall.
    Output {
        /// File descriptor.
        fd: u64,
        /// Text written.
        data: String,
    },
    /// The core is finished.
    Shutdown {},
    /// A statistics increment for the collector.
    Stats(StatsReport),
    /// To every component keeping statistics.
    Perf(PerfCmd),
}

impl Event {
    /// Wire tag of the event, as used by watchdog configuration.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Decode { .. } => "decode",
            Self::Issue { .. } => "issue",
            Self::Alu { .. } => "alu",
            Self::Lsu(_) => "lsu",
            Self::Commit { .. } => "commit",
            Self::Register(_) => "register",
            Self::L2(_) => "l2",
            Self::Mem(_) => "mem",
            Self::Mmu(_) => "mmu",
            Self::Output { .. } => "output",
            Self::Shutdown {} => "shutdown",
            Self::Stats(_) => "stats",
            Self::Perf(_) => "perf",
        }
    }
}

/// A broadcast answer or notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Instruction bytes delivered by Fetch.
    L1ic {
        /// Virtual address of the window.
        addr: u64,
        /// Window length.
        size: u64,
        /// Window bytes.
        data: Vec<u8>,
    },
    /// A finished load or store.
    L1dc {
        /// Instruction id.
        iid: u64,
        /// Virtual address.
        addr: u64,
        /// Access width.
        size: u64,
        /// Loaded bytes; absent for stores.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Vec<u8>>,
    },
    /// A block delivered by the L2.
    L2 {
        /// Physical block address.
        addr: u64,
        /// Length.
        size: u64,
        /// Block bytes.
        data: Vec<u8>,
    },
    /// Bytes read from main memory.
    Mem {
        /// Start address.
        addr: u64,
        /// Length.
        size: u64,
        /// Bytes.
        data: Vec<u8>,
        /// Address space of `addr`.
        #[serde(default, skip_serializing_if = "Space::is_physical")]
        space: Space,
    },
    /// A register read.
    Register {
        /// Register read.
        name: RegName,
        /// Its value.
        data: u64,
    },
    /// A page translation.
    Mmu {
        /// Virtual address that was translated.
        vaddr: u64,
        /// Physical frame base.
        frame: u64,
    },
    /// A BTAC hit predicted taken.
    Prediction {
        /// Address of the branch.
        branchpc: u64,
        /// Length of the branch instruction.
        size: u64,
        /// Predicted target.
        targetpc: u64,
    },
    /// A control instruction resolved to a different target than Fetch followed.
    Mispredict {
        /// The resolved instruction.
        insn: Box<Instruction>,
    },
    /// First instruction id Issue assigns after a mispredict.
    RecoveryIid {
        /// Instruction id.
        iid: u64,
    },
    /// A value produced by the ALU, ahead of retirement.
    Forward {
        /// Producer.
        iid: u64,
        /// Destination register.
        rd: u8,
        /// Value.
        result: u64,
    },
    /// The instruction was squashed.
    Flush(InsnRef),
    /// The memory instruction is non-speculative.
    Confirm(InsnRef),
    /// The instruction retired.
    Retire(Box<Instruction>),
    /// Decode consumed `bytes` of its buffer.
    Decoded {
        /// Bytes consumed.
        bytes: u64,
    },
}

impl Response {
    /// Wire tag of the response, as used by watchdog configuration.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::L1ic { .. } => "l1ic",
            Self::L1dc { .. } => "l1dc",
            Self::L2 { .. } => "l2",
            Self::Mem { .. } => "mem",
            Self::Register { .. } => "register",
            Self::Mmu { .. } => "mmu",
            Self::Prediction { .. } => "prediction",
            Self::Mispredict { .. } => "mispredict",
            Self::RecoveryIid { .. } => "recovery_iid",
            Self::Forward { .. } => "forward",
            Self::Flush(_) => "flush",
            Self::Confirm(_) => "confirm",
            Self::Retire(_) => "retire",
            Self::Decoded { .. } => "decoded",
        }
    }
}

/// Plain-text control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    /// Start (or resume) ticking.
    Run,
    /// Stop ticking; state is kept.
    Pause,
    /// Tear down and exit.
    Bye,
}

/// Snapshot phase attached to a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Directive {
    /// Stop retiring; in-flight work keeps settling.
    Hold,
    /// Write architectural state into the snapshot regions of memory.
    Capture,
    /// Persist memory to `path` and release the hold.
    Persist {
        /// Snapshot file.
        path: PathBuf,
    },
}

/// One simulated cycle as delivered to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Cycle being processed.
    pub cycle: Cycle,
    /// Responses due this cycle.
    pub results: Vec<Envelope<Response>>,
    /// Events due this cycle.
    pub events: Vec<Envelope<Event>>,
    /// Snapshot phase, if one is in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Directive>,
}

/// An unscheduled register command from the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCommand {
    /// Core whose register file is addressed.
    pub coreid: CoreId,
    /// The read or write.
    #[serde(flatten)]
    pub op: RegisterCmd,
}

/// Top-level message on a coordinator link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// `run`, `pause` or `bye`.
    Text(Control),
    /// Advance one cycle.
    Tick(Tick),
    /// Patch one configuration field of `service`.
    Config {
        /// Service addressed.
        service: String,
        /// Dotted field path.
        field: String,
        /// New value.
        val: Value,
    },
    /// Adopt `cycle` and reload state from `path`.
    Restore {
        /// Cycle to resume from.
        cycle: Cycle,
        /// Snapshot file.
        path: PathBuf,
    },
    /// Read or write a register outside the tick protocol.
    Register(RegisterCommand),
    /// The component finished `cycle` (or a restore to `cycle`).
    Ack {
        /// Cycle acknowledged.
        cycle: Cycle,
    },
    /// A scheduled event.
    Event(Envelope<Event>),
    /// A scheduled response.
    Result(Envelope<Response>),
    /// A log line for the coordinator.
    Info {
        /// Reporting service.
        service: String,
        /// Core, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coreid: Option<CoreId>,
        /// Text.
        text: String,
    },
    /// An undefined instruction reached execute.
    Undefined {
        /// Core.
        coreid: CoreId,
        /// The instruction.
        insn: Box<Instruction>,
    },
    /// Commit retired `n` instructions this cycle.
    Committed {
        /// Core.
        coreid: CoreId,
        /// Count.
        n: u64,
    },
    /// Register values reported by a register file.
    Registers {
        /// Core.
        coreid: CoreId,
        /// `(name, value)` in snapshot order.
        values: Vec<(RegName, u64)>,
    },
    /// The component aborted.
    Fatal {
        /// Component name.
        service: String,
        /// Core, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coreid: Option<CoreId>,
        /// Error text.
        reason: String,
    },
}
