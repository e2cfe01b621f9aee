//! Load/Store Unit.
//!
//! The LSU owns the L1 data cache and performs memory accesses in program order,
//! one at a time, once Commit has confirmed them:
//! 1. **Arrival:** The op is registered with Commit (`commit`, awaiting confirmation).
//!    A load fully covered by an older queued store takes its bytes from that store
//!    and completes at once.
//! 2. **Execution:** The access is split at the L1 block boundary, each part is
//!    translated, and loads read the L1 (filling from the L2 on a miss) while stores
//!    update the L1 if resident and write through to the L2.
//! 3. **Completion:** An `l1dc` result carrying the load data tells Commit the op is done.

use std::collections::{HashSet, VecDeque};

use serde_json::Value;
use tracing::trace;

use crate::common::{CoreId, ProtocolError};
use crate::config::{CacheConfig, MmuConfig};
use crate::core::units::cache::SetAssociativeCache;
use crate::core::units::mmu::tlb::Tlb;
use crate::isa::{Confirmation, InsnRef, Instruction};
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, LsuCmd, MemCmd, MmuCmd, Response, Space};
use crate::stats::Counters;

/// The slice of an access that falls in one cache block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    vaddr: u64,
    size: u64,
    data: Option<Vec<u8>>,
}

/// The access being performed.
#[derive(Debug)]
struct Access {
    insn: Instruction,
    parts: Vec<Part>,
}

impl Access {
    fn is_done(&self) -> bool {
        self.parts.iter().all(|p| p.data.is_some())
    }
}

/// Load/store unit of one core.
#[derive(Debug)]
pub struct LoadStoreUnit {
    coreid: CoreId,
    config: CacheConfig,
    pagesize: u64,
    l1dc: SetAssociativeCache,
    tlb: Tlb,
    queue: VecDeque<Instruction>,
    current: Option<Access>,
    fill: Option<u64>,
    translating: HashSet<u64>,
    stats: Counters,
}

impl LoadStoreUnit {
    /// Creates the unit with an empty L1 data cache.
    pub fn new(coreid: CoreId, config: &CacheConfig, mmu: &MmuConfig) -> Self {
        Self {
            coreid,
            config: config.clone(),
            pagesize: mmu.pagesize,
            l1dc: SetAssociativeCache::new(config),
            tlb: Tlb::new(mmu.tlb_entries),
            queue: VecDeque::new(),
            current: None,
            fill: None,
            translating: HashSet::new(),
            stats: Counters::default(),
        }
    }

    /// Ops waiting to execute, oldest first.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn vpn(&self, addr: u64) -> u64 {
        addr / self.pagesize
    }

    fn physical(&self, addr: u64) -> Option<u64> {
        self.tlb
            .lookup(self.vpn(addr))
            .map(|frame| frame | (addr & (self.pagesize - 1)))
    }

    /// Bytes for `load` from the youngest older store that overlaps it.
    ///
    /// A store that only partially covers the load ends the search.
    fn forward(&self, load: &Instruction) -> Option<Vec<u8>> {
        let (lo, hi) = load.access_range()?;
        let older = self
            .queue
            .iter()
            .rev()
            .chain(self.current.as_ref().map(|a| &a.insn));
        for store in older.filter(|i| i.cmd.is_store()) {
            let (slo, shi) = store.access_range()?;
            if shi <= lo || hi <= slo {
                continue;
            }
            if slo <= lo && hi <= shi {
                let bytes = store.store_bytes()?;
                return Some(bytes[(lo - slo) as usize..(hi - slo) as usize].to_vec());
            }
            return None;
        }
        None
    }

    fn arrive(&mut self, insn: &Instruction, out: &mut Outbox) {
        let mut insn = insn.clone();
        insn.confirmation = Confirmation::Awaiting;
        out.event(1, Event::Commit { insn: Box::new(insn.clone()) });
        if insn.cmd.is_load()
            && let Some(data) = self.forward(&insn)
        {
            self.stats.bump("forwarded");
            let (addr, _) = insn.access_range().unwrap_or_default();
            out.result(1, Response::L1dc {
                iid: insn.iid.unwrap_or_default(),
                addr,
                size: data.len() as u64,
                data: Some(data),
            });
            return;
        }
        self.queue.push_back(insn);
    }

    fn confirm(&mut self, r: &InsnRef) {
        if let Some(insn) = self.queue.iter_mut().find(|i| i.iid == Some(r.iid)) {
            insn.confirmation = Confirmation::Confirmed;
        }
    }

    fn flush(&mut self, r: &InsnRef) {
        self.queue.retain(|i| i.iid != Some(r.iid));
        if self.current.as_ref().is_some_and(|a| a.insn.iid == Some(r.iid)) {
            self.current = None;
        }
    }

    /// Splits `[addr, addr + n)` at block boundaries.
    fn split(&self, insn: &Instruction) -> Vec<Part> {
        let Some((start, end)) = insn.access_range() else {
            return Vec::new();
        };
        let blocksize = self.l1dc.blocksize() as u64;
        let mut parts = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let limit = (self.l1dc.blockaddr(cursor) + blocksize).min(end);
            parts.push(Part {
                vaddr: cursor,
                size: limit - cursor,
                data: None,
            });
            cursor = limit;
        }
        parts
    }

    fn start_next(&mut self) {
        if self.current.is_some() {
            return;
        }
        let front_confirmed = self
            .queue
            .front()
            .is_some_and(|i| i.confirmation == Confirmation::Confirmed);
        if !front_confirmed {
            return;
        }
        if let Some(insn) = self.queue.pop_front() {
            let parts = self.split(&insn);
            self.current = Some(Access { insn, parts });
        }
    }

    /// Makes progress on the current access.
    fn step(&mut self, out: &mut Outbox) {
        let Some(mut access) = self.current.take() else {
            return;
        };
        let store = access.insn.store_bytes();
        let base = access.insn.addr.unwrap_or_default();
        for part in access.parts.iter_mut().filter(|p| p.data.is_none()) {
            let Some(paddr) = self.physical(part.vaddr) else {
                let vpn = self.vpn(part.vaddr);
                if self.translating.insert(vpn) {
                    out.event(1, Event::Mmu(MmuCmd::V2p { vaddr: part.vaddr }));
                }
                continue;
            };
            if let Some(bytes) = &store {
                let at = (part.vaddr - base) as usize;
                let chunk = bytes[at..at + part.size as usize].to_vec();
                let _ = self.l1dc.poke(paddr, &chunk);
                out.event(1, Event::L2(MemCmd::Poke {
                    addr: paddr,
                    data: chunk.clone(),
                    space: Space::Physical,
                }));
                self.stats.bump("stores");
                part.data = Some(chunk);
                continue;
            }
            match self.l1dc.peek(paddr, part.size as usize) {
                Some(data) => {
                    self.stats.bump("hits");
                    part.data = Some(data);
                }
                None if self.fill.is_none() => {
                    let block = self.l1dc.blockaddr(paddr);
                    self.stats.bump("misses");
                    trace!(coreid = self.coreid, block = format_args!("{block:#x}"), "l1dc miss");
                    self.fill = Some(block);
                    out.event(1, Event::L2(MemCmd::Peek {
                        addr: block,
                        size: self.l1dc.blocksize() as u64,
                        space: Space::Physical,
                    }));
                }
                None => {}
            }
        }
        if !access.is_done() {
            self.current = Some(access);
            return;
        }
        let size: u64 = access.parts.iter().map(|p| p.size).sum();
        let data = access.insn.cmd.is_load().then(|| {
            access
                .parts
                .into_iter()
                .flat_map(|p| p.data.unwrap_or_default())
                .collect()
        });
        out.result(self.config.latency, Response::L1dc {
            iid: access.insn.iid.unwrap_or_default(),
            addr: base,
            size,
            data,
        });
    }
}

impl Component for LoadStoreUnit {
    fn name(&self) -> &'static str {
        "lsu"
    }

    fn coreid(&self) -> Option<CoreId> {
        Some(self.coreid)
    }

    fn tick(
        &mut self,
        results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        for env in events {
            match &env.body {
                Event::Lsu(LsuCmd::Insn { insn }) => self.arrive(insn, out),
                Event::Lsu(LsuCmd::Purge) => {
                    self.l1dc.purge();
                    self.tlb.flush();
                    self.translating.clear();
                    self.fill = None;
                }
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        for env in results {
            match &env.body {
                Response::Confirm(r) => self.confirm(r),
                Response::Flush(r) => self.flush(r),
                Response::L2 { addr, data, .. } if self.fill == Some(*addr) => {
                    let _ = self.l1dc.install(*addr, data, Some(self.coreid));
                    self.fill = None;
                }
                Response::Mmu { vaddr, frame } => {
                    let vpn = self.vpn(*vaddr);
                    self.tlb.insert(vpn, *frame);
                    let _ = self.translating.remove(&vpn);
                }
                _ => {}
            }
        }
        self.start_next();
        self.step(out);
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)?;
        self.l1dc = SetAssociativeCache::new(&self.config);
        self.fill = None;
        Ok(())
    }
}
