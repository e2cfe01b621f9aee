//! Fetch Stage: block windows from the L1 instruction cache.
//!
//! Fetch serves `fetch get` requests from the branch predictor one at a time:
//! 1. Translate the request address through the stage TLB (asking main memory on a miss).
//! 2. Look the window `[addr, end of block)` up in the L1 instruction cache.
//! 3. On a hit, deliver the window to Decode and broadcast it to the predictor.
//! 4. On a miss, fill the block from the L2 and retry.
//!
//! A mispredict drops queued requests, and bytes in flight to Decode are bounded
//! by Decode's buffer capacity (Decode returns credit with `decoded`).

use std::collections::{HashSet, VecDeque};

use serde_json::Value;
use tracing::trace;

use crate::common::{CoreId, ProtocolError};
use crate::config::{CacheConfig, MmuConfig};
use crate::core::units::cache::SetAssociativeCache;
use crate::core::units::mmu::tlb::Tlb;
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, FetchCmd, MemCmd, MmuCmd, Response, Space};
use crate::stats::Counters;

/// Fetch stage of one core.
#[derive(Debug)]
pub struct FetchStage {
    coreid: CoreId,
    config: CacheConfig,
    pagesize: u64,
    l1ic: SetAssociativeCache,
    tlb: Tlb,
    requests: VecDeque<u64>,
    fill: Option<u64>,
    translating: HashSet<u64>,
    in_flight: u64,
    capacity: u64,
    stats: Counters,
}

impl FetchStage {
    /// Creates the stage; `capacity` is Decode's buffer size in bytes.
    pub fn new(coreid: CoreId, config: &CacheConfig, mmu: &MmuConfig, capacity: usize) -> Self {
        Self {
            coreid,
            config: config.clone(),
            pagesize: mmu.pagesize,
            l1ic: SetAssociativeCache::new(config),
            tlb: Tlb::new(mmu.tlb_entries),
            requests: VecDeque::new(),
            fill: None,
            translating: HashSet::new(),
            in_flight: 0,
            capacity: capacity as u64,
            stats: Counters::default(),
        }
    }

    fn vpn(&self, addr: u64) -> u64 {
        addr / self.pagesize
    }

    fn physical(&self, addr: u64) -> Option<u64> {
        self.tlb
            .lookup(self.vpn(addr))
            .map(|frame| frame | (addr & (self.pagesize - 1)))
    }

    fn request_translation(&mut self, addr: u64, out: &mut Outbox) {
        let vpn = self.vpn(addr);
        if self.translating.insert(vpn) {
            out.event(1, Event::Mmu(MmuCmd::V2p { vaddr: addr }));
        }
    }

    /// Tries to serve the oldest request.
    fn access(&mut self, out: &mut Outbox) {
        let Some(&addr) = self.requests.front() else {
            return;
        };
        let Some(paddr) = self.physical(addr) else {
            self.request_translation(addr, out);
            return;
        };
        if self.fill.is_some() {
            return;
        }
        let n = (self.l1ic.blocksize() - self.l1ic.offset(paddr)) as u64;
        if self.in_flight > 0 && self.in_flight + n > self.capacity {
            self.stats.bump("backpressure_stalls");
            return;
        }
        match self.l1ic.peek(paddr, n as usize) {
            Some(data) => {
                let _ = self.requests.pop_front();
                self.in_flight += n;
                self.stats.bump("accesses");
                trace!(coreid = self.coreid, addr = format_args!("{addr:#x}"), n, "fetch");
                out.event(self.config.latency, Event::Decode {
                    addr,
                    data: data.clone(),
                });
                out.result(self.config.latency, Response::L1ic { addr, size: n, data });
            }
            None => {
                let block = self.l1ic.blockaddr(paddr);
                self.stats.bump("misses");
                self.fill = Some(block);
                out.event(1, Event::L2(MemCmd::Peek {
                    addr: block,
                    size: self.l1ic.blocksize() as u64,
                    space: Space::Physical,
                }));
            }
        }
    }
}

impl Component for FetchStage {
    fn name(&self) -> &'static str {
        "fetch"
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
        let mut mispredict = false;
        for env in results {
            match &env.body {
                Response::Mispredict { .. } => {
                    self.requests.clear();
                    self.in_flight = 0;
                    mispredict = true;
                }
                Response::L2 { addr, data, .. } if self.fill == Some(*addr) => {
                    let _ = self.l1ic.install(*addr, data, Some(self.coreid));
                    self.fill = None;
                }
                Response::Mmu { vaddr, frame } => {
                    let vpn = self.vpn(*vaddr);
                    self.tlb.insert(vpn, *frame);
                    let _ = self.translating.remove(&vpn);
                }
                Response::Decoded { bytes } => self.in_flight = self.in_flight.saturating_sub(*bytes),
                _ => {}
            }
        }
        for env in events {
            match &env.body {
                Event::Fetch(FetchCmd::Get { addr }) if !mispredict => self.requests.push_back(*addr),
                Event::Fetch(FetchCmd::Purge) => {
                    self.l1ic.purge();
                    self.tlb.flush();
                    self.translating.clear();
                    self.fill = None;
                }
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        self.access(out);
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)?;
        self.l1ic = SetAssociativeCache::new(&self.config);
        self.fill = None;
        Ok(())
    }
}
