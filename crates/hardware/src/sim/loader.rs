//! Program Loading and Initial Process State.
//!
//! This module turns an executable into a [`Program`]: the bytes main memory places
//! in each core's virtual address space at boot, plus the register values the
//! coordinator hands to the register file before the first cycle. It performs:
//! 1. **ELF loading:** Every `PT_LOAD` segment of a little-endian RV64 ELF.
//! 2. **Entry lookup:** The configured entry symbol, falling back to the header entry for `_start`.
//! 3. **Stack setup:** `argc` at `sp`, the `argv` pointers from `sp + 8`, a NULL, then the strings.

use std::fs;
use std::path::Path;

use object::read::elf::ElfFile64;
use object::{Endianness, Object, ObjectSegment, ObjectSymbol};
use tracing::{debug, warn};

use crate::common::constants::{INITIAL_TP, MAINMEM_PAGE_SIZE};
use crate::common::{LoadError, RegName};
use crate::config::LoaderConfig;

/// A contiguous run of initialized bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Virtual address of the first byte.
    pub vaddr: u64,
    /// Contents.
    pub data: Vec<u8>,
}

/// A process image ready to boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Memory contents, identical for every core.
    pub segments: Vec<Segment>,
    /// Initial `%pc`.
    pub entry: u64,
    /// Initial program break.
    pub brk: u64,
    /// Register values set before the first cycle.
    pub registers: Vec<(RegName, u64)>,
}

impl Program {
    /// A raw image placed at `addr` and entered there; no stack is set up.
    pub fn from_bytes(addr: u64, bytes: Vec<u8>) -> Self {
        let end = addr + bytes.len() as u64;
        Self {
            segments: vec![Segment { vaddr: addr, data: bytes }],
            entry: addr,
            brk: page_align(end),
            registers: vec![(RegName::Pc, addr)],
        }
    }

    /// Adds a stack at `sp` holding `argv`, and the registers that point at it.
    #[must_use]
    pub fn with_stack(mut self, sp: u64, argv: &[String]) -> Self {
        let (segment, registers) = stack_image(sp, argv);
        self.segments.push(segment);
        self.registers.retain(|(name, _)| *name == RegName::Pc);
        self.registers.extend(registers);
        self
    }

    /// One past the highest loaded byte.
    pub fn end(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| s.vaddr + s.data.len() as u64)
            .max()
            .unwrap_or_default()
    }
}

const fn page_align(addr: u64) -> u64 {
    (addr + MAINMEM_PAGE_SIZE - 1) & !(MAINMEM_PAGE_SIZE - 1)
}

/// Builds the initial stack and the registers that describe it.
fn stack_image(sp: u64, argv: &[String]) -> (Segment, Vec<(RegName, u64)>) {
    let argc = argv.len() as u64;
    let strings_at = sp + 8 + 8 * (argc + 1);
    let mut data = argc.to_le_bytes().to_vec();
    let mut strings = Vec::new();
    for arg in argv {
        data.extend_from_slice(&(strings_at + strings.len() as u64).to_le_bytes());
        strings.extend_from_slice(arg.as_bytes());
        strings.push(0);
    }
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(&strings);
    let registers = vec![
        (RegName::X(2), sp),
        (RegName::X(4), INITIAL_TP),
        (RegName::X(10), argc),
        (RegName::X(11), sp + 8),
    ];
    (Segment { vaddr: sp, data }, registers)
}

/// Loads the ELF at `path` with `argv` (conventionally the program name first).
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read or parsed, or the configured
/// entry symbol is missing.
pub fn load_elf(path: &Path, config: &LoaderConfig, argv: &[String]) -> Result<Program, LoadError> {
    let data = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |e: object::Error| LoadError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let elf = ElfFile64::<Endianness>::parse(&*data).map_err(parse_err)?;
    if !elf.is_little_endian() {
        return Err(LoadError::Parse {
            path: path.to_path_buf(),
            reason: "not a little-endian image".to_string(),
        });
    }

    let mut segments = Vec::new();
    for segment in elf.segments() {
        let mut bytes = segment.data().map_err(parse_err)?.to_vec();
        bytes.resize(segment.size() as usize, 0);
        if bytes.is_empty() {
            continue;
        }
        debug!(vaddr = format_args!("{:#x}", segment.address()), len = bytes.len(), "segment");
        segments.push(Segment {
            vaddr: segment.address(),
            data: bytes,
        });
    }

    let entry = match elf.symbol_by_name(&config.entry) {
        Some(sym) => sym.address(),
        None if config.entry == "_start" => {
            warn!(path = %path.display(), "no _start symbol, using the header entry point");
            elf.entry()
        }
        None => return Err(LoadError::MissingSymbol(config.entry.clone())),
    };

    let image = Program {
        segments,
        entry,
        brk: 0,
        registers: vec![(RegName::Pc, entry)],
    };
    let brk = page_align(image.end());
    Ok(Program { brk, ..image }.with_stack(config.stack_pointer, argv))
}
