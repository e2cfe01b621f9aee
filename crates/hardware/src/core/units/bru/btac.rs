//! Branch Target Address Cache (BTAC).
//!
//! Maps the PC of a taken branch or jump to its last realized target. Capacity is
//! bounded; inserting into a full BTAC evicts the least recently used entry.
//! Lookups cover a whole fetch window so one I-cache delivery can be checked at once.

use std::collections::VecDeque;

/// A BTAC entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtacEntry {
    /// Address of the branch.
    pub branchpc: u64,
    /// Realized target.
    pub targetpc: u64,
    /// Size of the branch instruction.
    pub size: u64,
}

/// Branch Target Address Cache structure.
#[derive(Debug, Clone)]
pub struct Btac {
    /// Entries, most recently used first.
    entries: VecDeque<BtacEntry>,
    capacity: usize,
}

impl Btac {
    /// Creates an empty BTAC holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The BTAC is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for exactly `pc`.
    pub fn get(&self, pc: u64) -> Option<BtacEntry> {
        self.entries.iter().find(|e| e.branchpc == pc).copied()
    }

    /// The first branch, in address order, within `[start, end)`.
    ///
    /// Marks it most recently used.
    pub fn lookup_window(&mut self, start: u64, end: u64) -> Option<BtacEntry> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.branchpc >= start && e.branchpc < end)
            .min_by_key(|(_, e)| e.branchpc)
            .map(|(i, _)| i)?;
        self.promote(pos)
    }

    /// Creates or retargets the entry for `branchpc`.
    pub fn update(&mut self, branchpc: u64, targetpc: u64, size: u64) {
        if let Some(pos) = self.entries.iter().position(|e| e.branchpc == branchpc) {
            let _ = self.entries.remove(pos);
        } else if self.entries.len() == self.capacity {
            let _ = self.entries.pop_back();
        }
        self.entries.push_front(BtacEntry {
            branchpc,
            targetpc,
            size,
        });
    }

    /// Forgets `branchpc`.
    pub fn remove(&mut self, branchpc: u64) -> Option<BtacEntry> {
        let pos = self.entries.iter().position(|e| e.branchpc == branchpc)?;
        self.entries.remove(pos)
    }

    fn promote(&mut self, pos: usize) -> Option<BtacEntry> {
        let entry = self.entries.remove(pos)?;
        self.entries.push_front(entry);
        Some(entry)
    }
}
