//! ALU Stage: execute and syscall driver.
//!
//! The ALU collects instructions from Issue together with the register values
//! read on their behalf, and executes them as soon as every operand is known:
//! 1. **Arithmetic and control:** The outcome is written into the record, optionally
//!    forwarded to Issue, and the record is sent to Commit.
//! 2. **Loads and stores:** Only the effective address is computed here; the LSU does the rest.
//! 3. **ECALL:** Driven through a [`SyscallProxy`] conversation that may read and
//!    write process memory before the result is known.
//!
//! With early branch resolution the ALU detects mispredicts itself and drops the
//! wrong-path instructions it still holds.

use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::common::constants::SYSCALL_REGS;
use crate::common::{CoreId, ProtocolError, RegName};
use crate::config::PipelineConfig;
use crate::isa::execute::execute;
use crate::isa::syscall::{Peek, SyscallProxy};
use crate::isa::{Instruction, Opcode};
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Directive, Envelope, Event, FetchCmd, LsuCmd, MemCmd, Response, Space};
use crate::stats::Counters;

use super::Recovery;

/// An ECALL in progress.
#[derive(Debug)]
struct Syscall {
    insn: Instruction,
    extra: Vec<Vec<u8>>,
    waiting: Option<Peek>,
    touched_memory: bool,
}

/// ALU stage of one core.
pub struct AluStage {
    coreid: CoreId,
    config: PipelineConfig,
    pending: Vec<Instruction>,
    syscall: Option<Syscall>,
    proxy: Box<dyn SyscallProxy>,
    recovery: Recovery,
    held: bool,
    stats: Counters,
}

impl fmt::Debug for AluStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AluStage")
            .field("coreid", &self.coreid)
            .field("pending", &self.pending.len())
            .field("syscall", &self.syscall)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

impl AluStage {
    /// Creates the stage with `proxy` serving this core's ECALLs.
    pub fn new(coreid: CoreId, config: &PipelineConfig, proxy: Box<dyn SyscallProxy>) -> Self {
        Self {
            coreid,
            config: config.clone(),
            pending: Vec::new(),
            syscall: None,
            proxy,
            recovery: Recovery::Idle,
            held: false,
            stats: Counters::default(),
        }
    }

    fn accept(&mut self, insn: &Instruction, out: &mut Outbox) {
        let iid = insn.iid.unwrap_or_default();
        if !self.recovery.admits(iid) {
            self.stats.bump("flushed");
            out.result(1, Response::Flush(insn.reference()));
            return;
        }
        self.pending.push(insn.clone());
    }

    /// Fills in a register value for every waiting instruction that read it.
    fn operand(&mut self, name: RegName, data: u64) {
        let RegName::X(reg) = name else {
            return;
        };
        for insn in &mut self.pending {
            if insn.sources().contains(&reg) && !insn.operands.contains_key(&reg) {
                let _ = insn.operands.insert(reg, data);
            }
        }
    }

    /// Drops every held instruction younger than `iid`.
    fn squash_after(&mut self, iid: u64, out: &mut Outbox) {
        let (dead, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|i| i.iid.unwrap_or_default() > iid);
        self.pending = live;
        for insn in dead {
            self.stats.bump("flushed");
            out.result(1, Response::Flush(insn.reference()));
        }
    }

    fn execute_ready(&mut self, out: &mut Outbox) {
        self.pending.sort_by_key(|i| i.iid);
        // Memory ops reach the LSU in program order.
        let mut memory_blocked = false;
        let mut i = 0;
        while i < self.pending.len() {
            let cmd = self.pending[i].cmd;
            if !self.pending[i].is_ready() || (cmd.is_memory() && memory_blocked) {
                memory_blocked |= cmd.is_memory();
                i += 1;
                continue;
            }
            if self.pending[i].cmd == Opcode::Ecall {
                if self.held || self.syscall.is_some() {
                    i += 1;
                    continue;
                }
                let insn = self.pending.remove(i);
                self.syscall = Some(Syscall {
                    insn,
                    extra: Vec::new(),
                    waiting: None,
                    touched_memory: false,
                });
                continue;
            }
            let mut insn = self.pending.remove(i);
            if self.complete(&mut insn, out) {
                let iid = insn.iid.unwrap_or_default();
                self.squash_after(iid, out);
            }
        }
    }

    /// Executes one non-syscall instruction. Returns `true` on an early mispredict.
    fn complete(&mut self, insn: &mut Instruction, out: &mut Outbox) -> bool {
        self.stats.bump("executed");
        if insn.cmd == Opcode::Undefined {
            warn!(coreid = self.coreid, pc = format_args!("{:#x}", insn.pc), word = insn.word, "undefined instruction");
            out.undefined(insn);
            insn.completed = true;
            out.event(2, Event::Commit { insn: Box::new(insn.clone()) });
            return false;
        }
        let outcome = execute(insn);
        outcome.apply(insn);
        if insn.cmd.is_memory() {
            out.event(1, Event::Lsu(LsuCmd::Insn { insn: Box::new(insn.clone()) }));
            return false;
        }
        insn.completed = true;
        if self.config.result_forwarding
            && let Some(rd) = insn.destination()
            && let Some(value) = insn.result.or(insn.ret_pc)
        {
            out.result(1, Response::Forward {
                iid: insn.iid.unwrap_or_default(),
                rd,
                result: value,
            });
        }
        let mispredict = self.config.early_branch_resolution && insn.is_mispredicted();
        if mispredict {
            self.stats.bump("mispredicts");
            debug!(
                coreid = self.coreid,
                iid = insn.iid,
                pc = format_args!("{:#x}", insn.pc),
                target = format_args!("{:#x}", insn.actual_next()),
                "mispredict"
            );
            out.result(1, Response::Mispredict { insn: Box::new(insn.clone()) });
            self.recovery = Recovery::mispredicted(insn.iid.unwrap_or_default());
        }
        out.event(2, Event::Commit { insn: Box::new(insn.clone()) });
        mispredict
    }

    /// Advances the ECALL in progress by one proxy call.
    fn step_syscall(&mut self, out: &mut Outbox) {
        let Some(sys) = self.syscall.as_mut() else {
            return;
        };
        if sys.waiting.is_some() {
            return;
        }
        let num = sys.insn.operand(Some(17)).unwrap_or_default();
        let mut args = [0u64; 6];
        for (arg, reg) in args.iter_mut().zip(SYSCALL_REGS) {
            *arg = sys.insn.operand(Some(reg)).unwrap_or_default();
        }
        let effect = self.proxy.do_syscall(num, args, out.cycle(), &sys.extra);

        if let Some(peek) = effect.peek
            && !effect.done
        {
            sys.touched_memory = true;
            sys.waiting = Some(peek);
            out.event(1, Event::Mem(MemCmd::Peek {
                addr: peek.addr,
                size: peek.size,
                space: Space::Virtual,
            }));
            return;
        }
        if !effect.done {
            // A proxy that neither finishes nor asks for memory is retried next cycle.
            return;
        }

        let Some(mut sys) = self.syscall.take() else {
            return;
        };
        for poke in effect.poke {
            sys.touched_memory = true;
            out.event(1, Event::Mem(MemCmd::Poke {
                addr: poke.addr,
                data: poke.data,
                space: Space::Virtual,
            }));
        }
        if let Some(output) = effect.output {
            out.event(1, Event::Output {
                fd: output.fd,
                data: output.data,
            });
        }
        if sys.touched_memory {
            out.event(1, Event::Fetch(FetchCmd::Purge));
            out.event(1, Event::Lsu(LsuCmd::Purge));
            out.event(1, Event::L2(MemCmd::Invalidate { coreid: self.coreid }));
        }
        self.stats.bump("syscalls");
        sys.insn.shutdown = effect.shutdown;
        sys.insn.result = effect.result;
        sys.insn.completed = true;
        out.event(2, Event::Commit { insn: Box::new(sys.insn) });
    }

    fn syscall_data(&mut self, addr: u64, data: &[u8]) {
        if let Some(sys) = self.syscall.as_mut()
            && sys.waiting.is_some_and(|p| p.addr == addr)
        {
            sys.extra.push(data.to_vec());
            sys.waiting = None;
        }
    }
}

impl Component for AluStage {
    fn name(&self) -> &'static str {
        "alu"
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
                Response::Mispredict { insn } if !self.config.early_branch_resolution => {
                    let iid = insn.iid.unwrap_or_default();
                    self.recovery = Recovery::mispredicted(iid);
                    self.squash_after(iid, out);
                }
                Response::RecoveryIid { iid } => self.recovery.recovery_iid(*iid),
                _ => {}
            }
        }
        for env in events {
            match &env.body {
                Event::Alu { insn } => self.accept(insn, out),
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        for env in results {
            match &env.body {
                Response::Register { name, data } => self.operand(*name, *data),
                Response::Mem {
                    addr,
                    data,
                    space: Space::Virtual,
                    ..
                } => self.syscall_data(*addr, data),
                _ => {}
            }
        }
        self.execute_ready(out);
        if !self.held {
            self.step_syscall(out);
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
