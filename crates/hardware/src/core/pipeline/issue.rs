//! Issue Stage: in-order issue with hazard tracking.
//!
//! Issue assigns instruction ids in program order and releases instructions to
//! the ALU once their sources are available. For each source register:
//! 1. **No producer in flight:** read it from the register file (reply arrives with the instruction).
//! 2. **One producer that forwarded this cycle:** take the forwarded value.
//! 3. **Otherwise:** stall; nothing younger issues either.
//!
//! Serializing instructions (ECALL, FENCE) issue alone, and a control instruction
//! predicted taken ends the cycle's issue group and discards the wrong-path
//! instructions that followed it.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde_json::Value;
use tracing::debug;

use crate::common::{CoreId, ProtocolError, RegName};
use crate::config::PipelineConfig;
use crate::isa::{Instruction, Opcode, Prediction};
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, RegisterCmd, Response};
use crate::stats::Counters;

use super::scoreboard::Scoreboard;

/// Issue stage of one core.
#[derive(Debug)]
pub struct IssueStage {
    coreid: CoreId,
    config: PipelineConfig,
    decoded: VecDeque<Instruction>,
    issued: BTreeMap<u64, Opcode>,
    scoreboard: Scoreboard,
    forward: HashMap<u8, (u64, u64)>,
    predictions: HashMap<u64, u64>,
    next_iid: u64,
    skip_to: Option<u64>,
    stats: Counters,
}

/// Where an instruction's sources come from.
struct Operands {
    ready: BTreeMap<u8, u64>,
    reads: Vec<u8>,
}

impl IssueStage {
    /// Creates the stage; ids start at zero.
    pub fn new(coreid: CoreId, config: &PipelineConfig) -> Self {
        Self {
            coreid,
            config: config.clone(),
            decoded: VecDeque::new(),
            issued: BTreeMap::new(),
            scoreboard: Scoreboard::new(),
            forward: HashMap::new(),
            predictions: HashMap::new(),
            next_iid: 0,
            skip_to: None,
            stats: Counters::default(),
        }
    }

    /// Next id to be assigned.
    pub const fn next_iid(&self) -> u64 {
        self.next_iid
    }

    fn resolve(&self, insn: &Instruction) -> Option<Operands> {
        let mut ops = Operands {
            ready: BTreeMap::new(),
            reads: Vec::new(),
        };
        for src in insn.sources() {
            if src == 0 {
                let _ = ops.ready.insert(0, 0);
                continue;
            }
            match self.scoreboard.producers(src) {
                [] => ops.reads.push(src),
                [producer] => match self.forward.get(&src) {
                    Some(&(iid, value)) if iid == *producer => {
                        let _ = ops.ready.insert(src, value);
                    }
                    _ => return None,
                },
                _ => return None,
            }
        }
        Some(ops)
    }

    /// Drops queued instructions until `target`; remembers it if not reached.
    fn discard_until(&mut self, target: u64) {
        while let Some(front) = self.decoded.front() {
            if front.pc == target {
                self.skip_to = None;
                return;
            }
            let _ = self.decoded.pop_front();
        }
        self.skip_to = Some(target);
    }

    fn accept(&mut self, insn: &Instruction) {
        if let Some(target) = self.skip_to {
            if insn.pc != target {
                self.stats.bump("discarded");
                return;
            }
            self.skip_to = None;
        }
        self.decoded.push_back(insn.clone());
    }

    fn mispredict(&mut self, insn: &Instruction, out: &mut Outbox) {
        let iid = insn.iid.unwrap_or_default();
        self.decoded.clear();
        self.predictions.clear();
        self.scoreboard.squash_after(iid);
        self.issued.retain(|&k, _| k <= iid);
        self.skip_to = Some(insn.actual_next());
        debug!(coreid = self.coreid, iid, recovery = self.next_iid, "mispredict");
        out.result(1, Response::RecoveryIid { iid: self.next_iid });
    }

    fn retire(&mut self, iid: u64) {
        let _ = self.issued.remove(&iid);
        self.scoreboard.clear(iid);
    }

    fn issue(&mut self, out: &mut Outbox) {
        let mut count = 0;
        while count < self.config.issue_width {
            let Some(front) = self.decoded.front() else {
                break;
            };
            if self.issued.values().any(|cmd| cmd.is_serializing()) {
                self.stats.bump("serialize_stalls");
                break;
            }
            if front.cmd.is_serializing() && !self.issued.is_empty() {
                self.stats.bump("serialize_stalls");
                break;
            }
            let Some(ops) = self.resolve(front) else {
                self.stats.bump("hazard_stalls");
                break;
            };
            let Some(mut insn) = self.decoded.pop_front() else {
                break;
            };

            let iid = self.next_iid;
            self.next_iid += 1;
            insn.iid = Some(iid);
            insn.operands = ops.ready;
            for reg in ops.reads {
                out.event(1, Event::Register(RegisterCmd::Get { name: RegName::X(reg) }));
            }
            if insn.cmd.is_control() {
                let target = self
                    .predictions
                    .remove(&insn.pc)
                    .unwrap_or_else(|| insn.fallthrough());
                insn.prediction = Some(Prediction { targetpc: target });
            }
            if let Some(rd) = insn.destination() {
                self.scoreboard.set_producer(rd, iid);
            }
            let _ = self.issued.insert(iid, insn.cmd);
            count += 1;

            let redirect = insn.cmd.is_control() && insn.predicted_next() != insn.fallthrough();
            let serializing = insn.cmd.is_serializing();
            let target = insn.predicted_next();
            out.event(2, Event::Alu { insn: Box::new(insn) });
            if redirect {
                self.discard_until(target);
                break;
            }
            if serializing {
                break;
            }
        }
        self.stats.histo("width", count);
    }
}

impl Component for IssueStage {
    fn name(&self) -> &'static str {
        "issue"
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
        self.forward.clear();
        let mut mispredict = false;
        for env in results {
            match &env.body {
                Response::Forward { iid, rd, result } => {
                    let _ = self.forward.insert(*rd, (*iid, *result));
                }
                Response::Prediction { branchpc, targetpc, .. } => {
                    let _ = self.predictions.insert(*branchpc, *targetpc);
                }
                Response::Mispredict { insn } => {
                    self.mispredict(insn, out);
                    mispredict = true;
                }
                Response::Flush(r) => self.retire(r.iid),
                Response::Retire(insn) => self.retire(insn.iid.unwrap_or_default()),
                _ => {}
            }
        }
        for env in events {
            match &env.body {
                Event::Issue { insn } if !mispredict => self.accept(insn),
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        self.issue(out);
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)
    }
}
