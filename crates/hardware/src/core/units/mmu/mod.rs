//! Memory Management Unit (MMU).
//!
//! Per-core virtual-to-physical translation with lazy frame allocation. The first
//! touch of a (core, virtual page) pair allocates the next physical frame; frames
//! are handed out monotonically from [`MMU_BASE`] so they never alias across cores.
//! Stages cache translations in a local [`Tlb`](tlb::Tlb) and ask the owner of the
//! [`SimpleMmu`] with an `mmu v2p` event on a miss.

/// Translation Lookaside Buffer for per-stage translation caching.
pub mod tlb;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::CoreId;
use crate::common::constants::MMU_BASE;

/// Translation key: the page-aligned virtual address tagged with its core.
///
/// # Examples
///
/// ```
/// use nebula_core::core::units::mmu::frame;
///
/// assert_eq!(frame(0x1000, 0x1234, 3), (0x1000, 3));
/// ```
pub fn frame(pagesize: u64, addr: u64, coreid: CoreId) -> (u64, CoreId) {
    (addr & !(pagesize - 1), coreid)
}

/// One stored mapping, as it appears in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Owning core.
    pub coreid: CoreId,
    /// Page-aligned virtual address.
    pub vframe: u64,
    /// Page-aligned physical address.
    pub pframe: u64,
}

/// Frame allocator and translation table for all cores.
#[derive(Debug, Clone)]
pub struct SimpleMmu {
    pagesize: u64,
    next_frame: u64,
    table: BTreeMap<(u64, CoreId), u64>,
}

impl SimpleMmu {
    /// Creates an empty MMU with `pagesize`-byte pages (a power of two).
    pub fn new(pagesize: u64) -> Self {
        Self {
            pagesize,
            next_frame: MMU_BASE,
            table: BTreeMap::new(),
        }
    }

    /// Page size in bytes.
    pub fn pagesize(&self) -> u64 {
        self.pagesize
    }

    /// Physical frame of the page holding `vaddr`, allocating it on first touch.
    pub fn translate(&mut self, vaddr: u64, coreid: CoreId) -> u64 {
        let key = frame(self.pagesize, vaddr, coreid);
        if let Some(&pframe) = self.table.get(&key) {
            return pframe;
        }
        let pframe = self.next_frame;
        self.next_frame += self.pagesize;
        let _ = self.table.insert(key, pframe);
        pframe
    }

    /// Physical address of `vaddr`.
    pub fn physical(&mut self, vaddr: u64, coreid: CoreId) -> u64 {
        self.translate(vaddr, coreid) | (vaddr & (self.pagesize - 1))
    }

    /// Existing translation, without allocating.
    pub fn lookup(&self, vaddr: u64, coreid: CoreId) -> Option<u64> {
        self.table.get(&frame(self.pagesize, vaddr, coreid)).copied()
    }

    /// Drops every mapping of `coreid`. Frames are not reused.
    pub fn purge(&mut self, coreid: CoreId) {
        self.table.retain(|&(_, core), _| core != coreid);
    }

    /// All mappings, ordered by core then virtual frame.
    pub fn translations(&self) -> Vec<Translation> {
        let mut all: Vec<_> = self
            .table
            .iter()
            .map(|(&(vframe, coreid), &pframe)| Translation {
                coreid,
                vframe,
                pframe,
            })
            .collect();
        all.sort_by_key(|t| (t.coreid, t.vframe));
        all
    }

    /// Replaces the table with a snapshot's mappings.
    pub fn restore(&mut self, translations: &[Translation]) {
        self.table = translations
            .iter()
            .map(|t| ((t.vframe, t.coreid), t.pframe))
            .collect();
        self.next_frame = translations
            .iter()
            .map(|t| t.pframe + self.pagesize)
            .max()
            .unwrap_or(MMU_BASE)
            .max(MMU_BASE);
    }
}
