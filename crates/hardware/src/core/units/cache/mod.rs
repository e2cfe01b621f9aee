//! Set-Associative Cache.
//!
//! A data-holding cache shared by the L1 instruction cache, the L1 data cache and
//! the L2. Addresses split into `tag | set | offset` by pure shifts of
//! `log2(nsets)` and `log2(blocksize)`. It provides:
//! 1. **Access:** `peek` returns bytes only on a hit; `poke` updates a resident
//!    line, and a full-block `poke` onto a miss installs the line.
//! 2. **Eviction:** Invalid ways fill first, then the configured policy picks a victim.
//! 3. **Maintenance:** `purge` drops everything, `invalidate` drops lines owned by one
//!    core, `victim` reports what a fill would evict.

/// Cache replacement policy implementations (LRU, Random).
pub mod policies;

use self::policies::{LruPolicy, RandomPolicy, ReplacementPolicy};
use crate::common::CoreId;
use crate::config::{CacheConfig, ReplacementPolicy as PolicyType};

/// One cache block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheLine {
    /// Address tag.
    pub tag: u64,
    /// Block contents (`blocksize` bytes).
    pub data: Vec<u8>,
    /// Line holds valid data.
    pub valid: bool,
    /// Line was written since it was filled.
    pub dirty: bool,
    /// Core that installed the line.
    pub misc: Option<CoreId>,
}

/// A line chosen for eviction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Victim {
    /// Address of the evicted block.
    pub blockaddr: u64,
    /// The line as it was before eviction.
    pub line: CacheLine,
}

/// Set-associative cache with per-line data.
pub struct SetAssociativeCache {
    lines: Vec<CacheLine>,
    nsets: usize,
    nways: usize,
    blocksize: usize,
    set_bits: u32,
    offset_bits: u32,
    policy: Box<dyn ReplacementPolicy>,
}

impl std::fmt::Debug for SetAssociativeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetAssociativeCache")
            .field("nsets", &self.nsets)
            .field("nways", &self.nways)
            .field("blocksize", &self.blocksize)
            .field("valid", &self.lines.iter().filter(|l| l.valid).count())
            .finish_non_exhaustive()
    }
}

impl SetAssociativeCache {
    /// Builds an empty cache from a validated geometry.
    ///
    /// Zero-sized dimensions are clamped to one so the structure is always usable.
    pub fn new(config: &CacheConfig) -> Self {
        let nsets = config.nsets.max(1).next_power_of_two();
        let nways = config.nways.max(1);
        let blocksize = config.blocksize.max(1).next_power_of_two();
        let policy: Box<dyn ReplacementPolicy> = match config.policy {
            PolicyType::Lru => Box::new(LruPolicy::new(nsets, nways)),
            PolicyType::Random => Box::new(RandomPolicy::new(nways)),
        };
        Self {
            lines: vec![CacheLine::default(); nsets * nways],
            nsets,
            nways,
            blocksize,
            set_bits: nsets.trailing_zeros(),
            offset_bits: blocksize.trailing_zeros(),
            policy,
        }
    }

    /// Block size in bytes.
    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Number of sets.
    pub fn nsets(&self) -> usize {
        self.nsets
    }

    /// Associativity.
    pub fn nways(&self) -> usize {
        self.nways
    }

    /// Tag bits of `addr`.
    pub fn tag(&self, addr: u64) -> u64 {
        addr >> (self.offset_bits + self.set_bits)
    }

    /// Set index of `addr`.
    pub fn setnum(&self, addr: u64) -> usize {
        ((addr >> self.offset_bits) & (self.nsets as u64 - 1)) as usize
    }

    /// Byte offset of `addr` within its block.
    pub fn offset(&self, addr: u64) -> usize {
        (addr & (self.blocksize as u64 - 1)) as usize
    }

    /// Address of the first byte of the block holding `addr`.
    pub fn blockaddr(&self, addr: u64) -> u64 {
        addr & !(self.blocksize as u64 - 1)
    }

    /// `n` bytes from `addr` lie in one block.
    pub fn fits(&self, addr: u64, n: usize) -> bool {
        n > 0 && self.offset(addr) + n - 1 < self.blocksize
    }

    fn lookup(&self, addr: u64) -> Option<usize> {
        let set = self.setnum(addr);
        let tag = self.tag(addr);
        let base = set * self.nways;
        (0..self.nways).find(|&way| {
            let line = &self.lines[base + way];
            line.valid && line.tag == tag
        })
    }

    /// The block holding `addr` is resident.
    pub fn contains(&self, addr: u64) -> bool {
        self.lookup(addr).is_some()
    }

    /// Reads `n` bytes at `addr`, or `None` on a miss or a block-straddling access.
    pub fn peek(&mut self, addr: u64, n: usize) -> Option<Vec<u8>> {
        if !self.fits(addr, n) {
            return None;
        }
        let way = self.lookup(addr)?;
        let set = self.setnum(addr);
        self.policy.touch(set, way);
        let off = self.offset(addr);
        Some(self.lines[set * self.nways + way].data[off..off + n].to_vec())
    }

    /// Writes `data` at `addr`.
    ///
    /// Updates a resident line, or installs the block when `data` is exactly one
    /// aligned block. Returns whether the cache now holds the bytes.
    pub fn poke(&mut self, addr: u64, data: &[u8]) -> bool {
        if !self.fits(addr, data.len()) {
            return false;
        }
        let set = self.setnum(addr);
        match self.lookup(addr) {
            Some(way) => {
                self.policy.touch(set, way);
                let off = self.offset(addr);
                let line = &mut self.lines[set * self.nways + way];
                line.data[off..off + data.len()].copy_from_slice(data);
                line.dirty = true;
                true
            }
            None if data.len() == self.blocksize => {
                let _ = self.install(addr, data, None);
                true
            }
            None => false,
        }
    }

    /// Installs a whole block for `addr`, tagging it with `misc`.
    ///
    /// Returns the valid line it displaced, if any.
    pub fn install(&mut self, addr: u64, block: &[u8], misc: Option<CoreId>) -> Option<Victim> {
        let set = self.setnum(addr);
        let way = self.lookup(addr).unwrap_or_else(|| self.victim_way(set));
        let idx = set * self.nways + way;
        let tag = self.tag(addr);
        let mut data = block.to_vec();
        data.resize(self.blocksize, 0);
        let fresh = CacheLine {
            tag,
            data,
            valid: true,
            dirty: false,
            misc,
        };
        let old = std::mem::replace(&mut self.lines[idx], fresh);
        self.policy.replaced(set, way);
        let displaced = old.valid && old.tag != tag;
        displaced.then(|| Victim {
            blockaddr: self.line_addr(old.tag, set),
            line: old,
        })
    }

    /// The resident line a fill of `addr` would evict, if the set is full.
    pub fn victim(&self, addr: u64) -> Option<Victim> {
        if self.contains(addr) {
            return None;
        }
        let set = self.setnum(addr);
        let line = &self.lines[set * self.nways + self.victim_way(set)];
        line.valid.then(|| Victim {
            blockaddr: self.line_addr(line.tag, set),
            line: line.clone(),
        })
    }

    /// Invalidates every line.
    pub fn purge(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
            line.dirty = false;
        }
    }

    /// Invalidates lines installed on behalf of `owner`.
    pub fn invalidate(&mut self, owner: CoreId) {
        for line in self.lines.iter_mut().filter(|l| l.misc == Some(owner)) {
            line.valid = false;
            line.dirty = false;
        }
    }

    /// Number of valid lines.
    pub fn occupancy(&self) -> usize {
        self.lines.iter().filter(|l| l.valid).count()
    }

    fn victim_way(&self, set: usize) -> usize {
        let base = set * self.nways;
        (0..self.nways)
            .find(|&way| !self.lines[base + way].valid)
            .unwrap_or_else(|| self.policy.victim(set))
    }

    fn line_addr(&self, tag: u64, set: usize) -> u64 {
        (tag << (self.offset_bits + self.set_bits)) | ((set as u64) << self.offset_bits)
    }
}
