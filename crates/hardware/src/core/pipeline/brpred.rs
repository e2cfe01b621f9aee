//! Branch Predictor Stage.
//!
//! The predictor drives Fetch. It asks for one window at a time and, when the
//! window arrives, looks it up in the BTAC. A hit that the direction predictor
//! calls taken is announced to Issue as a `prediction` and fetch continues at the
//! target; otherwise fetch continues sequentially. Retirements train both tables,
//! and a mispredict restarts fetch at the realized target.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::trace;

use crate::common::{CoreId, ProtocolError};
use crate::config::BranchPredictorConfig;
use crate::core::units::bru::btac::Btac;
use crate::core::units::bru::counter::CounterTable;
use crate::isa::Instruction;
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, FetchCmd, Response};
use crate::stats::Counters;

/// Branch predictor of one core.
#[derive(Debug)]
pub struct BranchPredictorStage {
    coreid: CoreId,
    config: BranchPredictorConfig,
    btac: Btac,
    counters: CounterTable,
    queue: VecDeque<u64>,
    pending: Option<u64>,
    redirect: Option<u64>,
    start_pc: u64,
    stats: Counters,
}

impl BranchPredictorStage {
    /// Creates the predictor; fetch begins at `start_pc`.
    pub fn new(coreid: CoreId, config: &BranchPredictorConfig, start_pc: u64) -> Self {
        Self {
            coreid,
            config: config.clone(),
            btac: Btac::new(config.btac_entries),
            counters: CounterTable::new(config),
            queue: VecDeque::new(),
            pending: None,
            redirect: None,
            start_pc,
            stats: Counters::default(),
        }
    }

    /// Current BTAC contents.
    pub fn btac(&self) -> &Btac {
        &self.btac
    }

    fn window(&mut self, addr: u64, size: u64, out: &mut Outbox) {
        if let Some(target) = self.redirect {
            if addr != target {
                return;
            }
            self.redirect = None;
        }
        if self.pending == Some(addr) {
            self.pending = None;
        }
        let end = addr + size;
        let hit = self
            .btac
            .lookup_window(addr, end)
            .filter(|e| self.counters.predict(e.branchpc));
        let next = match hit {
            Some(entry) => {
                self.stats.bump("predicted_taken");
                trace!(
                    coreid = self.coreid,
                    branch = format_args!("{:#x}", entry.branchpc),
                    target = format_args!("{:#x}", entry.targetpc),
                    "prediction"
                );
                out.result(1, Response::Prediction {
                    branchpc: entry.branchpc,
                    size: entry.size,
                    targetpc: entry.targetpc,
                });
                // A forward target inside this window is already on its way to Decode.
                if entry.targetpc > entry.branchpc && entry.targetpc < end {
                    end
                } else {
                    entry.targetpc
                }
            }
            None => end,
        };
        self.queue.push_back(next);
    }

    fn train(&mut self, insn: &Instruction) {
        if !insn.cmd.is_control() {
            return;
        }
        let taken = insn.taken.unwrap_or(false);
        if taken {
            self.btac.update(insn.pc, insn.actual_next(), insn.size);
        }
        self.counters.train(insn.pc, taken);
        self.stats.bump("trained");
    }

    fn request(&mut self, out: &mut Outbox) {
        if self.pending.is_some() {
            return;
        }
        if let Some(addr) = self.queue.pop_front() {
            self.pending = Some(addr);
            out.event(1, Event::Fetch(FetchCmd::Get { addr }));
        }
    }
}

impl Component for BranchPredictorStage {
    fn name(&self) -> &'static str {
        "brpred"
    }

    fn coreid(&self) -> Option<CoreId> {
        Some(self.coreid)
    }

    fn boot(&mut self, out: &mut Outbox) -> Result<(), ProtocolError> {
        self.queue.push_back(self.start_pc);
        self.request(out);
        Ok(())
    }

    fn tick(
        &mut self,
        results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        for env in results {
            if let Response::Mispredict { insn } = &env.body {
                let target = insn.actual_next();
                self.queue.clear();
                self.queue.push_back(target);
                self.pending = None;
                self.redirect = Some(target);
            }
        }
        for env in results {
            match &env.body {
                Response::L1ic { addr, size, .. } => self.window(*addr, *size, out),
                Response::Retire(insn) => self.train(insn),
                Response::Flush(r) if r.cmd.is_control() => {
                    let _ = self.btac.remove(r.pc);
                }
                _ => {}
            }
        }
        for env in events {
            if let Event::Perf(_) = env.body {
                self.stats.report(self.name(), out);
            }
        }
        self.request(out);
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)?;
        self.btac = Btac::new(self.config.btac_entries);
        self.counters = CounterTable::new(&self.config);
        Ok(())
    }
}
