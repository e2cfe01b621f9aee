//! Register producer tracking.
//!
//! Maps each integer register to the iids of its in-flight producers, oldest
//! first. Issue consults it to decide whether a source can be read from the
//! register file, taken from this cycle's forwarded values, or must wait.

use crate::common::reg::NUM_REGS;

/// In-flight producers per integer register.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    writers: [Vec<u64>; NUM_REGS as usize],
}

impl Scoreboard {
    /// No producers in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `iid` as a producer of `reg`. No-op for `x0`.
    pub fn set_producer(&mut self, reg: u8, iid: u64) {
        if reg != 0 && reg < NUM_REGS {
            self.writers[reg as usize].push(iid);
        }
    }

    /// In-flight producers of `reg`, oldest first.
    pub fn producers(&self, reg: u8) -> &[u64] {
        self.writers.get(reg as usize).map_or(&[], Vec::as_slice)
    }

    /// Drops `iid` (retired or flushed) from every register.
    pub fn clear(&mut self, iid: u64) {
        for w in &mut self.writers {
            w.retain(|&p| p != iid);
        }
    }

    /// Drops every producer younger than `iid`.
    pub fn squash_after(&mut self, iid: u64) {
        for w in &mut self.writers {
            w.retain(|&p| p <= iid);
        }
    }

    /// Nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.writers.iter().all(Vec::is_empty)
    }
}
