//! Translation Lookaside Buffer (TLB).
//!
//! A direct-mapped cache of virtual page number to physical frame, held by the
//! stages that translate (Fetch and the LSU).

/// A single entry in the TLB.
#[derive(Debug, Clone, Copy, Default)]
struct TlbEntry {
    /// Virtual Page Number (tag).
    vpn: u64,
    /// Page-aligned physical address.
    frame: u64,
    valid: bool,
}

/// Translation Lookaside Buffer structure.
#[derive(Debug, Clone)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
    /// Mask used for indexing (size - 1).
    mask: usize,
}

impl Tlb {
    /// Creates a TLB with `size` entries (rounded up to a power of two).
    pub fn new(size: usize) -> Self {
        let size = size.max(1).next_power_of_two();
        Self {
            entries: vec![TlbEntry::default(); size],
            mask: size - 1,
        }
    }

    /// Physical frame of `vpn`, if cached.
    pub fn lookup(&self, vpn: u64) -> Option<u64> {
        let entry = self.entries[(vpn as usize) & self.mask];
        (entry.valid && entry.vpn == vpn).then_some(entry.frame)
    }

    /// Caches a translation, displacing whatever shared its slot.
    pub fn insert(&mut self, vpn: u64, frame: u64) {
        self.entries[(vpn as usize) & self.mask] = TlbEntry {
            vpn,
            frame,
            valid: true,
        };
    }

    /// Invalidates every entry.
    pub fn flush(&mut self) {
        for e in &mut self.entries {
            e.valid = false;
        }
    }
}
