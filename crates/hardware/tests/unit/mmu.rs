//! Address Translation Tests.
//!
//! The MMU hands out physical frames on first touch, one private address space
//! per core. The TLB is a direct-mapped cache of those translations held by the
//! stages that translate.

use nebula_core::common::constants::MMU_BASE;
use nebula_core::core::units::mmu::SimpleMmu;
use nebula_core::core::units::mmu::tlb::Tlb;
use pretty_assertions::assert_eq;

const PAGE: u64 = 4096;

// ══════════════════════════════════════════════════════════
// 1. Frame Allocation
// ══════════════════════════════════════════════════════════

#[test]
fn frames_are_allocated_in_order_from_the_base() {
    let mut mmu = SimpleMmu::new(PAGE);
    assert_eq!(mmu.translate(0x1000, 0), MMU_BASE);
    assert_eq!(mmu.translate(0x8000_0000, 0), MMU_BASE + PAGE);
    assert_eq!(mmu.translate(0x1fff, 0), MMU_BASE, "same page, same frame");
}

#[test]
fn every_core_has_its_own_address_space() {
    let mut mmu = SimpleMmu::new(PAGE);
    let core0 = mmu.translate(0x1000, 0);
    let core1 = mmu.translate(0x1000, 1);
    assert_ne!(core0, core1, "identical virtual pages map to distinct frames");
    assert_eq!(mmu.lookup(0x1000, 1), Some(core1));
    assert_eq!(mmu.lookup(0x2000, 1), None, "lookup never allocates");
}

#[test]
fn physical_address_keeps_the_page_offset() {
    let mut mmu = SimpleMmu::new(PAGE);
    assert_eq!(mmu.physical(0x1234, 0), MMU_BASE | 0x234);
}

#[test]
fn purge_forgets_one_core_only() {
    let mut mmu = SimpleMmu::new(PAGE);
    let _ = mmu.translate(0x1000, 0);
    let _ = mmu.translate(0x1000, 1);
    mmu.purge(1);
    assert!(mmu.lookup(0x1000, 0).is_some());
    assert!(mmu.lookup(0x1000, 1).is_none());
}

// ══════════════════════════════════════════════════════════
// 2. Restore
// ══════════════════════════════════════════════════════════

#[test]
fn restored_table_allocates_past_every_known_frame() {
    let mut original = SimpleMmu::new(PAGE);
    for vpage in [0x1000, 0x2000, 0x9000] {
        let _ = original.translate(vpage, 0);
    }
    let saved = original.translations();
    assert_eq!(saved.len(), 3);

    let mut restored = SimpleMmu::new(PAGE);
    restored.restore(&saved);
    assert_eq!(restored.lookup(0x2000, 0), original.lookup(0x2000, 0));
    assert_eq!(
        restored.translate(0x5000, 0),
        original.translate(0x5000, 0),
        "the next fresh frame is the same in both"
    );
}

// ══════════════════════════════════════════════════════════
// 3. TLB
// ══════════════════════════════════════════════════════════

#[test]
fn tlb_hits_after_insert_and_misses_after_flush() {
    let mut tlb = Tlb::new(8);
    assert_eq!(tlb.lookup(3), None);
    tlb.insert(3, MMU_BASE);
    assert_eq!(tlb.lookup(3), Some(MMU_BASE));
    tlb.flush();
    assert_eq!(tlb.lookup(3), None);
}

#[test]
fn tlb_conflicting_pages_replace_each_other() {
    let mut tlb = Tlb::new(8);
    tlb.insert(1, 0xa000);
    tlb.insert(9, 0xb000);
    assert_eq!(tlb.lookup(1), None, "vpn 9 maps to the same slot as vpn 1");
    assert_eq!(tlb.lookup(9), Some(0xb000));
}
