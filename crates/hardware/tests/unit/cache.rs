//! Set-Associative Cache Unit Tests.
//!
//! Verifies the block store shared by the L1 caches and the L2: address
//! decomposition, hit/miss, LRU victim choice, write behavior and owner-based
//! invalidation. The cache is built straight from a `CacheConfig`.

use nebula_core::config::{CacheConfig, ReplacementPolicy};
use nebula_core::core::units::cache::SetAssociativeCache;
use pretty_assertions::assert_eq;
use rstest::rstest;

/// 2 sets, 2 ways, 16-byte blocks.
///
/// Set index = (addr >> 4) & 1, so 0x00, 0x20 and 0x40 all land in set 0.
fn small(policy: ReplacementPolicy) -> SetAssociativeCache {
    SetAssociativeCache::new(&CacheConfig {
        nsets: 2,
        nways: 2,
        blocksize: 16,
        policy,
        latency: 1,
    })
}

fn block(fill: u8) -> Vec<u8> {
    vec![fill; 16]
}

// ══════════════════════════════════════════════════════════
// 1. Address Decomposition
// ══════════════════════════════════════════════════════════

#[rstest]
#[case(0x00, 0, 0, 0)]
#[case(0x1f, 0, 1, 15)]
#[case(0x24, 1, 0, 4)]
#[case(0x1234, 0x91, 1, 4)]
fn address_splits_into_tag_set_and_offset(
    #[case] addr: u64,
    #[case] tag: u64,
    #[case] set: usize,
    #[case] offset: usize,
) {
    let cache = small(ReplacementPolicy::Lru);
    assert_eq!(cache.tag(addr), tag, "tag of {addr:#x}");
    assert_eq!(cache.setnum(addr), set, "set of {addr:#x}");
    assert_eq!(cache.offset(addr), offset, "offset of {addr:#x}");
    assert_eq!(cache.blockaddr(addr), addr & !0xf);
}

// ══════════════════════════════════════════════════════════
// 2. Hit / Miss
// ══════════════════════════════════════════════════════════

#[test]
fn cold_cache_misses() {
    let mut cache = small(ReplacementPolicy::Lru);
    assert_eq!(cache.peek(0x40, 4), None, "nothing installed yet");
    assert_eq!(cache.occupancy(), 0);
}

#[test]
fn installed_block_serves_peeks_at_any_offset() {
    let mut cache = small(ReplacementPolicy::Lru);
    let data: Vec<u8> = (0..16).collect();
    assert!(cache.install(0x40, &data, None).is_none(), "empty way, no victim");
    assert_eq!(cache.peek(0x40, 4), Some(vec![0, 1, 2, 3]));
    assert_eq!(cache.peek(0x4c, 4), Some(vec![12, 13, 14, 15]));
}

#[test]
fn access_crossing_a_block_boundary_is_refused() {
    let mut cache = small(ReplacementPolicy::Lru);
    let _ = cache.install(0x00, &block(1), None);
    let _ = cache.install(0x10, &block(2), None);
    assert!(!cache.fits(0x0e, 4));
    assert_eq!(cache.peek(0x0e, 4), None, "split accesses are the caller's job");
}

// ══════════════════════════════════════════════════════════
// 3. LRU Replacement
// ══════════════════════════════════════════════════════════

#[test]
fn lru_evicts_the_least_recently_touched_way() {
    let mut cache = small(ReplacementPolicy::Lru);
    let _ = cache.install(0x00, &block(0xa), None);
    let _ = cache.install(0x20, &block(0xb), None);
    // Touch 0x00 so 0x20 becomes the LRU way.
    assert!(cache.peek(0x00, 1).is_some());

    let victim = cache.install(0x40, &block(0xc), None).unwrap();
    assert_eq!(victim.blockaddr, 0x20, "0x20 was least recently used");
    assert_eq!(victim.line.data, block(0xb));
    assert!(cache.contains(0x00));
    assert!(!cache.contains(0x20));
    assert!(cache.contains(0x40));
}

#[test]
fn victim_preview_matches_the_install() {
    let mut cache = small(ReplacementPolicy::Lru);
    let _ = cache.install(0x00, &block(1), None);
    let _ = cache.install(0x20, &block(2), None);
    let preview = cache.victim(0x40).unwrap();
    let actual = cache.install(0x40, &block(3), None).unwrap();
    assert_eq!(preview.blockaddr, actual.blockaddr);
    assert!(cache.victim(0x40).is_none(), "resident blocks have no victim");
}

#[test]
fn other_sets_are_untouched_by_eviction() {
    let mut cache = small(ReplacementPolicy::Lru);
    let _ = cache.install(0x10, &block(9), None);
    for addr in [0x00, 0x20, 0x40, 0x60] {
        let _ = cache.install(addr, &block(0), None);
    }
    assert_eq!(cache.peek(0x10, 1), Some(vec![9]), "set 1 keeps its block");
}

#[test]
fn random_policy_never_overfills_a_set() {
    let mut cache = small(ReplacementPolicy::Random);
    for addr in [0x00, 0x20, 0x40, 0x60, 0x80] {
        let _ = cache.install(addr, &block(addr as u8), None);
    }
    assert_eq!(cache.occupancy(), 2, "only set 0 was used, and it has two ways");
    assert!(cache.contains(0x80), "the newest block is always resident");
}

// ══════════════════════════════════════════════════════════
// 4. Writes
// ══════════════════════════════════════════════════════════

#[test]
fn poke_updates_a_resident_block_and_marks_it_dirty() {
    let mut cache = small(ReplacementPolicy::Lru);
    let _ = cache.install(0x00, &block(0), None);
    assert!(cache.poke(0x04, &[0xde, 0xad]));
    assert_eq!(cache.peek(0x03, 4), Some(vec![0, 0xde, 0xad, 0]));

    let _ = cache.install(0x20, &block(1), None);
    let victim = cache.install(0x40, &block(2), None).unwrap();
    assert_eq!(victim.blockaddr, 0x00);
    assert!(victim.line.dirty, "the poked block leaves dirty");
    assert_eq!(&victim.line.data[4..6], &[0xde, 0xad], "and carries the poked bytes");
}

#[test]
fn partial_poke_does_not_allocate() {
    let mut cache = small(ReplacementPolicy::Lru);
    assert!(!cache.poke(0x04, &[1, 2]));
    assert!(!cache.contains(0x04));
}

#[test]
fn full_block_poke_allocates() {
    let mut cache = small(ReplacementPolicy::Lru);
    assert!(cache.poke(0x30, &block(7)));
    assert_eq!(cache.peek(0x3f, 1), Some(vec![7]));
}

// ══════════════════════════════════════════════════════════
// 5. Purge and Invalidation
// ══════════════════════════════════════════════════════════

#[test]
fn invalidate_drops_only_the_owners_blocks() {
    let mut cache = small(ReplacementPolicy::Lru);
    let _ = cache.install(0x00, &block(1), Some(0));
    let _ = cache.install(0x10, &block(2), Some(1));
    let _ = cache.install(0x20, &block(3), None);

    cache.invalidate(1);
    assert!(cache.contains(0x00));
    assert!(!cache.contains(0x10), "core 1's block is gone");
    assert!(cache.contains(0x20));

    cache.purge();
    assert_eq!(cache.occupancy(), 0);
}
