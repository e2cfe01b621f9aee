//! Physical System Memory.
//!
//! This module implements the backing store of main memory. It provides:
//! 1. **Pages:** `PageStore`, sparse storage allocated one 4 KiB page at a time on first write.
//! 2. **Controller:** Latency modeling for main-memory reads.

/// Memory controller implementations for access latency modeling.
pub mod controller;

use std::collections::BTreeMap;

use crate::common::constants::MAINMEM_PAGE_SIZE;

/// Sparse byte-addressable memory.
///
/// Untouched bytes read as zero and reading never allocates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStore {
    pages: BTreeMap<u64, Box<[u8]>>,
}

impl PageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    const fn split(addr: u64) -> (u64, usize) {
        (addr & !(MAINMEM_PAGE_SIZE - 1), (addr & (MAINMEM_PAGE_SIZE - 1)) as usize)
    }

    /// Reads `n` bytes starting at `addr`.
    pub fn read(&self, addr: u64, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        let mut at = addr;
        while out.len() < n {
            let (base, off) = Self::split(at);
            let take = (MAINMEM_PAGE_SIZE as usize - off).min(n - out.len());
            match self.pages.get(&base) {
                Some(page) => out.extend_from_slice(&page[off..off + take]),
                None => out.resize(out.len() + take, 0),
            }
            at = at.wrapping_add(take as u64);
        }
        out
    }

    /// Writes `data` starting at `addr`, allocating pages as needed.
    pub fn write(&mut self, addr: u64, data: &[u8]) {
        let mut done = 0;
        let mut at = addr;
        while done < data.len() {
            let (base, off) = Self::split(at);
            let take = (MAINMEM_PAGE_SIZE as usize - off).min(data.len() - done);
            let page = self
                .pages
                .entry(base)
                .or_insert_with(|| vec![0u8; MAINMEM_PAGE_SIZE as usize].into_boxed_slice());
            page[off..off + take].copy_from_slice(&data[done..done + take]);
            done += take;
            at = at.wrapping_add(take as u64);
        }
    }

    /// Allocated pages in address order.
    pub fn pages(&self) -> impl Iterator<Item = (u64, &[u8])> {
        self.pages.iter().map(|(&addr, page)| (addr, &page[..]))
    }

    /// Number of allocated pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// No page has been written.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
