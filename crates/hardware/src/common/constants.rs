//! Global System Constants.
//!
//! This module defines system-wide constants used across the simulator. It includes:
//! 1. **Wire Constants:** The fixed frame size every message is padded to.
//! 2. **Memory Constants:** Physical frame base and main-memory page size.
//! 3. **Snapshot Constants:** Reserved physical addresses for register and cycle images.
//! 4. **Boot Constants:** Registers initialized by the loader.

/// Size of one wire frame in bytes (16 KiB); every encoded message is padded to this.
pub const MESSAGE_SIZE: usize = 1 << 14;

/// First physical frame handed out by the MMU.
pub const MMU_BASE: u64 = 0x1000_0000;

/// Granule main memory allocates on first touch (4 KiB).
pub const MAINMEM_PAGE_SIZE: u64 = 4096;

/// Physical address where the register file images its registers during a snapshot.
pub const SNAPSHOT_REGISTERS: u64 = 0x9000_0000;

/// Distance between two cores' register images.
pub const SNAPSHOT_REGISTER_STRIDE: u64 = 0x1000;

/// Physical address holding `1 + cycle` of the snapshot.
pub const SNAPSHOT_CYCLE: u64 = 0x9100_0000;

/// Initial thread pointer (x4) set by the loader.
pub const INITIAL_TP: u64 = 0xffff_0000;

/// Default initial stack pointer.
pub const INITIAL_SP: u64 = 0x8000_0000;

/// Registers an ECALL reads: a0..a5 and a7.
pub const SYSCALL_REGS: [u8; 7] = [10, 11, 12, 13, 14, 15, 17];

/// Register receiving a syscall's return value (a0).
pub const SYSCALL_RETURN_REG: u8 = 10;

/// Size of a compressed (16-bit) RISC-V instruction in bytes.
pub const INSTRUCTION_SIZE_16: u64 = 2;

/// Size of a standard (32-bit) RISC-V instruction in bytes.
pub const INSTRUCTION_SIZE_32: u64 = 4;
