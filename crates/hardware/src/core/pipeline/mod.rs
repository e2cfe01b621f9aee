//! Instruction pipeline components.
//!
//! Each stage is an independent [`Component`](crate::sim::component::Component)
//! instantiated once per core. Stages never share state: instructions travel
//! between them by value inside events, and stage-to-stage feedback (forwarded
//! values, confirms, flushes, mispredicts) travels as broadcast responses.
//! It includes the following components:
//! 1. **Frontend:** Fetch (with the L1 instruction cache), Decode and the branch predictor.
//! 2. **Issue:** In-order issue with register hazard tracking and operand forwarding.
//! 3. **Backend:** The ALU (including the syscall path), the LSU (with the L1 data cache) and Commit.
//! 4. **Watchdog:** Per-core liveness monitoring.

/// ALU execute stage and syscall driver.
pub mod alu;

/// Branch predictor stage.
pub mod brpred;

/// In-order retirement.
pub mod commit;

/// Byte-window decoder.
pub mod decode;

/// Instruction fetch and L1 instruction cache.
pub mod fetch;

/// In-order issue.
pub mod issue;

/// Load/store unit and L1 data cache.
pub mod lsu;

/// Register producer tracking for issue.
pub mod scoreboard;

/// Liveness watchdog.
pub mod watchdog;

pub use alu::AluStage;
pub use brpred::BranchPredictorStage;
pub use commit::CommitStage;
pub use decode::DecodeStage;
pub use fetch::FetchStage;
pub use issue::IssueStage;
pub use lsu::LoadStoreUnit;
pub use watchdog::Watchdog;

/// Squash window after a misprediction.
///
/// Everything younger than the mispredicted instruction and older than the
/// recovery iid announced by Issue is dead. Until that iid is known every
/// instruction younger than the mispredict is treated as dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recovery {
    /// No misprediction outstanding.
    #[default]
    Idle,
    /// Mispredicted at `after`; the recovery iid has not arrived yet.
    Pending {
        /// Iid of the mispredicted instruction.
        after: u64,
    },
    /// Instructions with `after < iid < until` are dead.
    Until {
        /// Iid of the mispredicted instruction.
        after: u64,
        /// First iid issued on the corrected path.
        until: u64,
    },
}

impl Recovery {
    /// Starts a squash window at the mispredicted `iid`.
    pub const fn mispredicted(iid: u64) -> Self {
        Self::Pending { after: iid }
    }

    /// Closes the window once Issue reports the first iid of the new path.
    pub fn recovery_iid(&mut self, until: u64) {
        if let Self::Pending { after } = *self {
            *self = Self::Until { after, until };
        }
    }

    /// `iid` is not in the squash window.
    pub const fn admits(&self, iid: u64) -> bool {
        match *self {
            Self::Idle => true,
            Self::Pending { after } => iid <= after,
            Self::Until { after, until } => iid <= after || iid >= until,
        }
    }

    /// First live iid at or after `iid`, skipping the squash window.
    pub const fn skip(&self, iid: u64) -> u64 {
        match *self {
            Self::Until { after, until } if iid > after && iid < until => until,
            _ => iid,
        }
    }
}
