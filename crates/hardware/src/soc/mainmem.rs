//! Main memory.
//!
//! The single shared backing store. It answers physical peeks and pokes from the
//! L2, virtual ones from the syscall path, and `mmu v2p` translations for every
//! core, since it owns the [`SimpleMmu`]. At boot it places the program image in
//! each core's address space; at `persist` it writes the snapshot file.

use std::path::Path;

use tracing::{debug, info};

use crate::common::{CoreId, Cycle, ProtocolError};
use crate::config::{MainMemConfig, MmuConfig};
use crate::core::units::mmu::SimpleMmu;
use crate::sim::component::{Component, Outbox};
use crate::sim::loader::Program;
use crate::sim::message::{Directive, Envelope, Event, MemCmd, MmuCmd, Response, Space};
use crate::sim::snapshot::Snapshot;
use crate::soc::memory::PageStore;
use crate::soc::memory::controller::{MemoryController, SimpleController};
use crate::stats::Counters;

/// Shared main memory and MMU.
pub struct MainMemory {
    store: PageStore,
    mmu: SimpleMmu,
    controller: Box<dyn MemoryController>,
    image: Option<Program>,
    cores: usize,
    config: MainMemConfig,
    stats: Counters,
}

impl std::fmt::Debug for MainMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainMemory")
            .field("pages", &self.store.len())
            .field("cores", &self.cores)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MainMemory {
    /// Memory for `cores` cores that loads `image` into each at boot.
    pub fn new(config: &MainMemConfig, mmu: &MmuConfig, cores: usize, image: Option<Program>) -> Self {
        Self {
            store: PageStore::new(),
            mmu: SimpleMmu::new(mmu.pagesize),
            controller: Box::new(SimpleController::new(config.peek_latency)),
            image,
            cores,
            config: config.clone(),
            stats: Counters::default(),
        }
    }

    /// Physical store.
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Physical address of `addr` in `space` for `coreid`.
    fn physical(&mut self, addr: u64, space: Space, coreid: Option<CoreId>) -> u64 {
        match space {
            Space::Physical => addr,
            Space::Virtual => self.mmu.physical(addr, coreid.unwrap_or_default()),
        }
    }

    /// Reads `size` bytes, splitting virtual accesses at page boundaries.
    pub fn read(&mut self, addr: u64, size: u64, space: Space, coreid: Option<CoreId>) -> Vec<u8> {
        let mut out = Vec::with_capacity(size as usize);
        for (at, n) in self.chunks(addr, size, space) {
            let pa = self.physical(at, space, coreid);
            out.extend(self.store.read(pa, n as usize));
        }
        out
    }

    /// Writes `data`, splitting virtual accesses at page boundaries.
    pub fn write(&mut self, addr: u64, data: &[u8], space: Space, coreid: Option<CoreId>) {
        let mut done = 0usize;
        for (at, n) in self.chunks(addr, data.len() as u64, space) {
            let pa = self.physical(at, space, coreid);
            self.store.write(pa, &data[done..done + n as usize]);
            done += n as usize;
        }
    }

    fn chunks(&self, addr: u64, size: u64, space: Space) -> Vec<(u64, u64)> {
        if space == Space::Physical {
            return vec![(addr, size)];
        }
        let pagesize = self.mmu.pagesize();
        let mut parts = Vec::new();
        let mut at = addr;
        let end = addr + size;
        while at < end {
            let n = (pagesize - (at & (pagesize - 1))).min(end - at);
            parts.push((at, n));
            at += n;
        }
        parts
    }

    fn service(&mut self, env: &Envelope<Event>, out: &mut Outbox) {
        match &env.body {
            Event::Mem(MemCmd::Peek { addr, size, space }) => {
                let data = self.read(*addr, *size, *space, env.coreid);
                let latency = self.controller.access_latency(*addr);
                self.stats.bump("peeks");
                out.result_to(latency, env.coreid, Response::Mem {
                    addr: *addr,
                    size: *size,
                    data,
                    space: *space,
                });
            }
            Event::Mmu(MmuCmd::V2p { vaddr }) => {
                let coreid = env.coreid.unwrap_or_default();
                let frame = self.mmu.translate(*vaddr, coreid);
                self.stats.bump("translations");
                out.result_to(1, env.coreid, Response::Mmu { vaddr: *vaddr, frame });
            }
            Event::Mmu(MmuCmd::Purge) => {
                if let Some(coreid) = env.coreid {
                    self.mmu.purge(coreid);
                }
            }
            _ => {}
        }
    }
}

impl Component for MainMemory {
    fn name(&self) -> &'static str {
        "mainmem"
    }

    fn boot(&mut self, _out: &mut Outbox) -> Result<(), ProtocolError> {
        if let Some(image) = self.image.take() {
            for coreid in 0..self.cores {
                for segment in &image.segments {
                    self.write(segment.vaddr, &segment.data, Space::Virtual, Some(coreid));
                }
            }
            info!(
                cores = self.cores,
                segments = image.segments.len(),
                pages = self.store.len(),
                "program image loaded"
            );
        }
        Ok(())
    }

    fn tick(
        &mut self,
        _results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        // Pokes land before peeks of the same cycle.
        for env in events {
            if let Event::Mem(MemCmd::Poke { addr, data, space }) = &env.body {
                self.write(*addr, data, *space, env.coreid);
                self.stats.bump("pokes");
            }
        }
        for env in events {
            match &env.body {
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => self.service(env, out),
            }
        }
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &serde_json::Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)?;
        self.controller = Box::new(SimpleController::new(self.config.peek_latency));
        Ok(())
    }

    fn snapshot(&mut self, directive: &Directive, out: &mut Outbox) -> Result<(), ProtocolError> {
        if let Directive::Persist { path } = directive {
            let snapshot = Snapshot::capture(out.cycle(), self.mmu.pagesize(), self.mmu.translations(), &self.store);
            snapshot.save(path)?;
        }
        Ok(())
    }

    fn restore(&mut self, cycle: Cycle, path: &Path) -> Result<(), ProtocolError> {
        let snapshot = Snapshot::load(path)?;
        self.store = snapshot.memory();
        self.mmu = SimpleMmu::new(snapshot.pagesize);
        self.mmu.restore(&snapshot.translations);
        self.image = None;
        debug!(cycle, pages = self.store.len(), "main memory restored");
        Ok(())
    }
}
