//! Snapshot files.
//!
//! A snapshot is main memory at a quiescent point: every touched page, the MMU
//! table, and the two reserved regions the pipeline fills during the `capture`
//! phase (per-core register images at [`SNAPSHOT_REGISTERS`] and `1 + cycle` at
//! [`SNAPSHOT_CYCLE`]). Everything else is rebuilt cold on restore.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::constants::{SNAPSHOT_CYCLE, SNAPSHOT_REGISTER_STRIDE, SNAPSHOT_REGISTERS};
use crate::common::reg::NUM_SLOTS;
use crate::common::{CoreId, Cycle, ProtocolError, RegName};
use crate::core::units::mmu::Translation;
use crate::soc::memory::PageStore;

/// Physical address of `coreid`'s register image.
pub const fn register_image(coreid: CoreId) -> u64 {
    SNAPSHOT_REGISTERS + coreid as u64 * SNAPSHOT_REGISTER_STRIDE
}

/// Serializes `values` in snapshot slot order, eight bytes each.
pub fn encode_registers(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// One page of memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// Page-aligned physical address.
    pub addr: u64,
    /// Page contents.
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}

/// Contents of a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Cycle on which the file was written.
    pub written_at: Cycle,
    /// MMU page size.
    pub pagesize: u64,
    /// MMU table.
    pub translations: Vec<Translation>,
    /// Touched pages, in address order.
    pub pages: Vec<PageImage>,
}

impl Snapshot {
    /// Captures `store` and the MMU table.
    pub fn capture(written_at: Cycle, pagesize: u64, translations: Vec<Translation>, store: &PageStore) -> Self {
        let pages = store
            .pages()
            .map(|(addr, data)| PageImage {
                addr,
                data: data.to_vec(),
            })
            .collect();
        Self {
            written_at,
            pagesize,
            translations,
            pages,
        }
    }

    /// Writes the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Snapshot`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ProtocolError> {
        let fail = |reason: String| ProtocolError::Snapshot {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }
        let text = serde_json::to_string(self).map_err(|e| fail(e.to_string()))?;
        fs::write(path, text).map_err(|e| fail(e.to_string()))?;
        info!(path = %path.display(), pages = self.pages.len(), "snapshot written");
        Ok(())
    }

    /// Reads a snapshot written by [`Snapshot::save`].
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Snapshot`] if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self, ProtocolError> {
        let fail = |reason: String| ProtocolError::Snapshot {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| fail(e.to_string()))
    }

    /// Rebuilds the page store.
    pub fn memory(&self) -> PageStore {
        let mut store = PageStore::new();
        for page in &self.pages {
            store.write(page.addr, &page.data);
        }
        store
    }

    /// The cycle to resume from (the `1 + cycle` marker).
    pub fn cycle(&self) -> Cycle {
        let raw = self.memory().read(SNAPSHOT_CYCLE, 8);
        let mut word = [0u8; 8];
        word.copy_from_slice(&raw);
        u64::from_le_bytes(word)
    }

    /// Register image of `coreid`, in snapshot order.
    pub fn registers(&self, coreid: CoreId) -> Vec<(RegName, u64)> {
        let raw = self.memory().read(register_image(coreid), NUM_SLOTS * 8);
        raw.chunks_exact(8)
            .enumerate()
            .filter_map(|(slot, bytes)| {
                let mut word = [0u8; 8];
                word.copy_from_slice(bytes);
                RegName::from_slot(slot).map(|name| (name, u64::from_le_bytes(word)))
            })
            .collect()
    }

    /// Value of one register in `coreid`'s image.
    pub fn register(&self, coreid: CoreId, name: RegName) -> u64 {
        self.registers(coreid)
            .into_iter()
            .find_map(|(n, v)| (n == name).then_some(v))
            .unwrap_or_default()
    }

    /// Reads `n` bytes of `coreid`'s virtual memory; unmapped bytes read as zero.
    pub fn read_virtual(&self, coreid: CoreId, vaddr: u64, n: usize) -> Vec<u8> {
        let store = self.memory();
        let mask = self.pagesize - 1;
        (0..n as u64)
            .map(|i| {
                let va = vaddr + i;
                self.translations
                    .iter()
                    .find(|t| t.coreid == coreid && t.vframe == va & !mask)
                    .map_or(0, |t| store.read(t.pframe | (va & mask), 1)[0])
            })
            .collect()
    }
}

mod hex {
    use std::fmt::Write;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let mut text = String::with_capacity(data.len() * 2);
        for b in data {
            let _ = write!(text, "{b:02x}");
        }
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        if text.len() % 2 != 0 {
            return Err(D::Error::custom("odd-length hex string"));
        }
        (0..text.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&text[i..i + 2], 16).map_err(D::Error::custom))
            .collect()
    }
}
