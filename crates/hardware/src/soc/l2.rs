//! Shared L2 cache.
//!
//! A physically indexed cache in front of main memory, shared by every core's L1s.
//! Peeks are served in arrival order, one at a time: a hit answers after the hit
//! latency, a miss fetches the whole block from main memory and holds the queue
//! until it arrives. Pokes write through without allocating.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::trace;

use crate::common::{CoreId, ProtocolError};
use crate::config::CacheConfig;
use crate::core::units::cache::SetAssociativeCache;
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, MemCmd, Response, Space};
use crate::stats::Counters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Request {
    coreid: Option<CoreId>,
    addr: u64,
    size: u64,
}

/// The shared second-level cache.
#[derive(Debug)]
pub struct L2Cache {
    config: CacheConfig,
    cache: SetAssociativeCache,
    queue: VecDeque<Request>,
    fill: Option<u64>,
    stats: Counters,
}

impl L2Cache {
    /// An empty L2 with the given geometry.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            config: config.clone(),
            cache: SetAssociativeCache::new(config),
            queue: VecDeque::new(),
            fill: None,
            stats: Counters::default(),
        }
    }

    fn command(&mut self, coreid: Option<CoreId>, cmd: &MemCmd, out: &mut Outbox) {
        match cmd {
            MemCmd::Peek { addr, size, .. } => self.queue.push_back(Request {
                coreid,
                addr: *addr,
                size: *size,
            }),
            MemCmd::Poke { addr, data, .. } => {
                let _ = self.cache.poke(*addr, data);
                self.stats.bump("writes");
                out.event_to(1, coreid, Event::Mem(MemCmd::Poke {
                    addr: *addr,
                    data: data.clone(),
                    space: Space::Physical,
                }));
            }
            MemCmd::Purge => {
                self.cache.purge();
                self.stats.bump("purges");
            }
            MemCmd::Invalidate { coreid } => {
                self.cache.invalidate(*coreid);
                self.stats.bump("invalidations");
            }
        }
    }

    fn serve(&mut self, out: &mut Outbox) {
        if self.fill.is_some() {
            return;
        }
        let Some(req) = self.queue.front().copied() else {
            return;
        };
        match self.cache.peek(req.addr, req.size as usize) {
            Some(data) => {
                let _ = self.queue.pop_front();
                self.stats.bump("accesses");
                out.result_to(self.config.latency, req.coreid, Response::L2 {
                    addr: req.addr,
                    size: req.size,
                    data,
                });
            }
            None => {
                let block = self.cache.blockaddr(req.addr);
                trace!(addr = format_args!("{block:#x}"), "l2 miss");
                self.stats.bump("misses");
                self.fill = Some(block);
                out.event_to(1, req.coreid, Event::Mem(MemCmd::Peek {
                    addr: block,
                    size: self.cache.blocksize() as u64,
                    space: Space::Physical,
                }));
            }
        }
    }
}

impl Component for L2Cache {
    fn name(&self) -> &'static str {
        "l2"
    }

    fn tick(
        &mut self,
        results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        for env in results {
            if let Response::Mem {
                addr,
                data,
                space: Space::Physical,
                ..
            } = &env.body
                && self.fill == Some(*addr)
            {
                let _ = self.cache.install(*addr, data, env.coreid);
                self.fill = None;
            }
        }
        for env in events {
            match &env.body {
                Event::L2(cmd) => self.command(env.coreid, cmd, out),
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        self.serve(out);
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)?;
        self.cache = SetAssociativeCache::new(&self.config);
        self.queue.clear();
        self.fill = None;
        Ok(())
    }
}
