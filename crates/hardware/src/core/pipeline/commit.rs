//! Commit Stage: in-order retirement.
//!
//! Commit is the only stage that changes architectural state. It holds completed
//! instructions until every older one has retired, then writes `%pc` and the
//! destination register and announces the retirement.
//!
//! Memory operations need one extra step: they arrive awaiting confirmation, and
//! Commit confirms them to the LSU only once they reach the head. A confirmed op
//! retires when the LSU reports the access done.
//!
//! With late branch resolution Commit is where mispredicts are discovered.

use std::collections::BTreeMap;

use serde_json::Value;
#[cfg(feature = "commit-log")]
use tracing::info;
use tracing::debug;

use crate::common::constants::SYSCALL_RETURN_REG;
use crate::common::{CoreId, ProtocolError, RegName};
use crate::config::PipelineConfig;
use crate::isa::{Confirmation, Instruction, Opcode};
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Directive, Envelope, Event, RegisterCmd, Response};
use crate::stats::Counters;

use super::Recovery;

/// Commit stage of one core.
#[derive(Debug)]
pub struct CommitStage {
    coreid: CoreId,
    config: PipelineConfig,
    pending: BTreeMap<u64, Instruction>,
    next: u64,
    recovery: Recovery,
    held: bool,
    finished: bool,
    stats: Counters,
}

impl CommitStage {
    /// Creates the stage expecting iid 0 first.
    pub fn new(coreid: CoreId, config: &PipelineConfig) -> Self {
        Self {
            coreid,
            config: config.clone(),
            pending: BTreeMap::new(),
            next: 0,
            recovery: Recovery::Idle,
            held: false,
            finished: false,
            stats: Counters::default(),
        }
    }

    /// Iid of the next instruction to retire.
    pub const fn next_iid(&self) -> u64 {
        self.next
    }

    fn flush_after(&mut self, iid: u64, out: &mut Outbox) {
        let dead = self.pending.split_off(&(iid + 1));
        for insn in dead.into_values() {
            self.stats.bump("flushed");
            out.result(1, Response::Flush(insn.reference()));
        }
    }

    fn accept(&mut self, insn: &Instruction, out: &mut Outbox) {
        let Some(iid) = insn.iid else {
            return;
        };
        if !self.recovery.admits(iid) {
            self.stats.bump("flushed");
            out.result(1, Response::Flush(insn.reference()));
            return;
        }
        if iid >= self.next {
            let _ = self.pending.insert(iid, insn.clone());
        }
    }

    fn access_done(&mut self, iid: u64, data: Option<&[u8]>) {
        if let Some(insn) = self.pending.get_mut(&iid) {
            if insn.cmd.is_load() {
                insn.result = data.and_then(|d| insn.extend_load(d));
            }
            insn.completed = true;
        }
    }

    fn retire(&mut self, insn: Instruction, out: &mut Outbox) {
        out.event(1, Event::Register(RegisterCmd::Set {
            name: RegName::Pc,
            data: insn.actual_next(),
        }));
        let rd = if insn.cmd == Opcode::Ecall {
            Some(SYSCALL_RETURN_REG)
        } else {
            insn.destination()
        };
        if let Some(rd) = rd
            && let Some(value) = insn.result.or(insn.ret_pc)
        {
            out.event(1, Event::Register(RegisterCmd::Set {
                name: RegName::X(rd),
                data: value,
            }));
        }
        #[cfg(feature = "commit-log")]
        info!(
            coreid = self.coreid,
            iid = insn.iid,
            pc = format_args!("{:#x}", insn.pc),
            cmd = %insn.cmd,
            result = ?insn.result,
            "retire"
        );
        out.result(1, Response::Retire(Box::new(insn)));
    }

    /// Retires from the head of the window as far as possible. Returns the count.
    fn sweep(&mut self, out: &mut Outbox) -> u64 {
        let mut n = 0;
        while !self.finished {
            self.next = self.recovery.skip(self.next);
            let Some(head) = self.pending.get_mut(&self.next) else {
                break;
            };
            if head.confirmation == Confirmation::Awaiting {
                head.confirmation = Confirmation::Confirmed;
                out.result(1, Response::Confirm(head.reference()));
                break;
            }
            if !head.completed {
                break;
            }
            let Some(insn) = self.pending.remove(&self.next) else {
                break;
            };
            self.next += 1;
            n += 1;
            self.stats.bump("retired");

            let late_mispredict = !self.config.early_branch_resolution && insn.is_mispredicted();
            let shutdown = insn.shutdown;
            let iid = insn.iid.unwrap_or_default();
            if late_mispredict {
                debug!(coreid = self.coreid, iid, pc = format_args!("{:#x}", insn.pc), "mispredict at commit");
                self.stats.bump("mispredicts");
                out.result(1, Response::Mispredict { insn: Box::new(insn.clone()) });
            }
            self.retire(insn, out);
            if late_mispredict {
                self.flush_after(iid, out);
                self.recovery = Recovery::mispredicted(iid);
                break;
            }
            if shutdown {
                debug!(coreid = self.coreid, iid, "process exited");
                self.finished = true;
                out.shutdown();
            }
        }
        n
    }
}

impl Component for CommitStage {
    fn name(&self) -> &'static str {
        "commit"
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
        for env in results {
            match &env.body {
                Response::Mispredict { insn } if self.config.early_branch_resolution => {
                    let iid = insn.iid.unwrap_or_default();
                    self.flush_after(iid, out);
                    self.recovery = Recovery::mispredicted(iid);
                }
                Response::RecoveryIid { iid } => self.recovery.recovery_iid(*iid),
                _ => {}
            }
        }
        for env in events {
            match &env.body {
                Event::Commit { insn } => self.accept(insn, out),
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        for env in results {
            if let Response::L1dc { iid, data, .. } = &env.body {
                self.access_done(*iid, data.as_deref());
            }
        }
        if !self.held {
            let n = self.sweep(out);
            if n > 0 {
                out.committed(n);
            }
        }
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)
    }

    fn snapshot(&mut self, directive: &Directive, _out: &mut Outbox) -> Result<(), ProtocolError> {
        self.held = !matches!(directive, Directive::Persist { .. });
        Ok(())
    }
}
