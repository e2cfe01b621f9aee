//! Coordinator.
//!
//! The coordinator owns simulated time. Each round it:
//! 1. **Selects** the next cycle with anything due (or the next cycle if nothing is).
//! 2. **Broadcasts** one `tick` carrying every envelope due on that cycle.
//! 3. **Collects** what the components say until every one of them has acknowledged,
//!    scheduling new envelopes in the [`FutureTable`].
//!
//! It also drives the snapshot phases, watches the termination conditions and, at
//! the end, drains statistics and gathers the final register values.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::constants::SNAPSHOT_CYCLE;
use crate::common::{CoreId, Cycle, ProtocolError, RegName, SimError};
use crate::config::SimulationConfig;
use crate::isa::Instruction;
use crate::stats::StatsTree;

use super::future::FutureTable;
use super::message::{
    Control, Directive, Envelope, Event, MemCmd, Message, PerfCmd, RegisterCmd, RegisterCommand, Space, Tick,
};
use super::service::Link;
use super::wire;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every core's program exited (or its watchdog fired).
    Shutdown,
    /// `max_cycles` was reached.
    MaxCycles,
    /// `max_instructions` was reached.
    MaxInstructions,
    /// An undefined instruction was executed with `break_on_undefined` set.
    Undefined,
}

/// Bytes a core wrote to a file descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    /// Writing core.
    pub coreid: Option<CoreId>,
    /// File descriptor.
    pub fd: u64,
    /// Text written.
    pub data: String,
}

/// An undefined instruction seen during the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedRecord {
    /// Core that executed it.
    pub coreid: CoreId,
    /// Address.
    pub pc: u64,
    /// Raw encoding.
    pub word: u32,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Last simulated cycle.
    pub cycles: Cycle,
    /// Instructions retired on all cores.
    pub instructions: u64,
    /// Why the run ended.
    pub stop: Option<StopReason>,
    /// Undefined instructions executed.
    pub undefined: Vec<UndefinedRecord>,
    /// Everything the program wrote, in order.
    pub output: Vec<OutputRecord>,
    /// Final architectural registers per core.
    pub registers: BTreeMap<CoreId, BTreeMap<RegName, u64>>,
    /// Statistics reported while draining.
    pub stats: StatsTree,
    /// Snapshot files written.
    pub snapshots: Vec<PathBuf>,
}

impl RunReport {
    /// Final value of one register.
    pub fn register(&self, coreid: CoreId, name: RegName) -> Option<u64> {
        self.registers.get(&coreid)?.get(&name).copied()
    }

    /// Exit status: `a0` of core 0 at the end of the run.
    pub fn exit_code(&self) -> Option<u64> {
        self.register(0, RegName::X(10))
    }

    /// Concatenated text written to `fd`.
    pub fn text(&self, fd: u64) -> String {
        self.output
            .iter()
            .filter(|o| o.fd == fd)
            .map(|o| o.data.as_str())
            .collect()
    }
}

/// Drives the components through simulated time.
#[derive(Debug)]
pub struct Coordinator {
    links: Vec<Link>,
    inbound: Receiver<(usize, Message)>,
    table: FutureTable,
    config: SimulationConfig,
    cycle: Cycle,
    done: BTreeSet<CoreId>,
    halted: bool,
    next_snapshot: Option<u64>,
    report: RunReport,
}

impl Coordinator {
    /// Takes over running components; `cycle` is where time starts.
    pub fn new(links: Vec<Link>, inbound: Receiver<(usize, Message)>, config: &SimulationConfig, cycle: Cycle) -> Self {
        Self {
            links,
            inbound,
            table: FutureTable::new(),
            config: config.clone(),
            cycle,
            done: BTreeSet::new(),
            halted: false,
            next_snapshot: config.snapshot_period,
            report: RunReport::default(),
        }
    }

    /// Current cycle.
    pub const fn cycle(&self) -> Cycle {
        self.cycle
    }

    fn send_all(&self, msg: &Message) -> Result<(), ProtocolError> {
        if self.config.strict_frames {
            wire::check(msg)?;
        }
        for link in &self.links {
            link.tx.send(msg.clone()).map_err(|_| self.lost(link.name))?;
        }
        Ok(())
    }

    /// Explains a closed link: a component that aborted has already sent its `fatal`.
    fn lost(&self, name: &str) -> ProtocolError {
        self.inbound
            .try_iter()
            .find_map(|(_, msg)| match msg {
                Message::Fatal { service, coreid, reason } => {
                    Some(ProtocolError::ComponentFault { service, coreid, reason })
                }
                _ => None,
            })
            .unwrap_or_else(|| ProtocolError::Disconnected(name.to_string()))
    }

    fn service(&self, index: usize) -> String {
        self.links
            .get(index)
            .map_or_else(|| format!("#{index}"), |l| l.name.to_string())
    }

    /// Handles one upstream message other than an acknowledgment.
    fn accept(&mut self, index: usize, msg: Message, cycle: Cycle) -> Result<(), ProtocolError> {
        match msg {
            Message::Event(env) => {
                if env.arrival <= cycle {
                    return Err(ProtocolError::ArrivalNotInFuture {
                        service: self.service(index),
                        arrival: env.arrival,
                        cycle,
                    });
                }
                match &env.body {
                    Event::Output { fd, data } => self.report.output.push(OutputRecord {
                        coreid: env.coreid,
                        fd: *fd,
                        data: data.clone(),
                    }),
                    Event::Stats(report) => self.report.stats.record(env.coreid, report),
                    _ => {}
                }
                self.table.push_event(env);
            }
            Message::Result(env) => {
                if env.arrival <= cycle {
                    return Err(ProtocolError::ArrivalNotInFuture {
                        service: self.service(index),
                        arrival: env.arrival,
                        cycle,
                    });
                }
                self.table.push_result(env);
            }
            Message::Info { service, coreid, text } => info!(service, coreid, "{text}"),
            Message::Undefined { coreid, insn } => self.undefined(coreid, &insn),
            Message::Committed { n, .. } => self.report.instructions += n,
            Message::Registers { coreid, values } => {
                self.report.registers.entry(coreid).or_default().extend(values);
            }
            Message::Fatal { service, coreid, reason } => {
                return Err(ProtocolError::ComponentFault { service, coreid, reason });
            }
            other => {
                return Err(ProtocolError::ComponentFault {
                    service: self.service(index),
                    coreid: None,
                    reason: format!("unexpected upstream message {other:?}"),
                });
            }
        }
        Ok(())
    }

    fn undefined(&mut self, coreid: CoreId, insn: &Instruction) {
        self.report.undefined.push(UndefinedRecord {
            coreid,
            pc: insn.pc,
            word: insn.word,
        });
        if self.config.break_on_undefined {
            warn!(coreid, pc = format_args!("{:#x}", insn.pc), "halting on undefined instruction");
            self.halted = true;
        }
    }

    /// Waits until every component has acknowledged `cycle`.
    fn await_acks(&mut self, cycle: Cycle) -> Result<(), ProtocolError> {
        let mut acks = 0;
        while acks < self.links.len() {
            let (index, msg) = self
                .inbound
                .recv()
                .map_err(|_| ProtocolError::Disconnected("components".to_string()))?;
            match msg {
                Message::Ack { cycle: acked } if acked == cycle => acks += 1,
                Message::Ack { cycle: acked } => {
                    return Err(ProtocolError::StrayAck {
                        service: self.service(index),
                        acked,
                        cycle,
                    });
                }
                other => self.accept(index, other, cycle)?,
            }
        }
        Ok(())
    }

    /// Sends configuration and initial registers, or restores; then starts every component.
    ///
    /// # Errors
    ///
    /// Any protocol violation during setup.
    pub fn start(
        &mut self,
        config: &[(String, String, serde_json::Value)],
        registers: &[(CoreId, RegName, u64)],
        restore: Option<&Path>,
    ) -> Result<(), ProtocolError> {
        for (service, field, val) in config {
            self.send_all(&Message::Config {
                service: service.clone(),
                field: field.clone(),
                val: val.clone(),
            })?;
        }
        match restore {
            Some(path) => {
                info!(path = %path.display(), cycle = self.cycle, "restoring snapshot");
                self.send_all(&Message::Restore {
                    cycle: self.cycle,
                    path: path.to_path_buf(),
                })?;
                self.await_acks(self.cycle)?;
            }
            None => {
                for &(coreid, name, data) in registers {
                    self.send_all(&Message::Register(RegisterCommand {
                        coreid,
                        op: RegisterCmd::Set { name, data },
                    }))?;
                }
            }
        }
        self.send_all(&Message::Text(Control::Run))?;
        self.await_acks(self.cycle)
    }

    /// Simulates one cycle.
    fn round(&mut self, cycle: Cycle, snapshot: Option<Directive>) -> Result<(), ProtocolError> {
        let pending = self.table.take(cycle);
        for env in &pending.events {
            if matches!(env.body, Event::Shutdown {})
                && let Some(coreid) = env.coreid
                && self.done.insert(coreid)
            {
                info!(coreid, cycle, "core shut down");
            }
        }
        let tick = Message::Tick(Tick {
            cycle,
            results: pending.results,
            events: pending.events,
            snapshot,
        });
        for link in &self.links {
            link.tx.send(tick.clone()).map_err(|_| self.lost(link.name))?;
        }
        self.await_acks(cycle)?;
        self.cycle = cycle;
        Ok(())
    }

    fn next_round(&mut self, snapshot: Option<Directive>) -> Result<(), ProtocolError> {
        let cycle = self.table.next_cycle(self.cycle);
        self.round(cycle, snapshot)
    }

    fn stop_reason(&self, cores: usize) -> Option<StopReason> {
        if self.halted {
            Some(StopReason::Undefined)
        } else if self.done.len() >= cores {
            Some(StopReason::Shutdown)
        } else if self.config.max_cycles.is_some_and(|max| self.cycle >= max) {
            Some(StopReason::MaxCycles)
        } else if self
            .config
            .max_instructions
            .is_some_and(|max| self.report.instructions >= max)
        {
            Some(StopReason::MaxInstructions)
        } else {
            None
        }
    }

    /// Holds retirement, lets in-flight work settle, captures state and persists it to `path`.
    ///
    /// # Errors
    ///
    /// Any protocol violation while the snapshot rounds run.
    pub fn snapshot(&mut self, path: &Path) -> Result<(), ProtocolError> {
        debug!(cycle = self.cycle, path = %path.display(), "snapshot");
        for _ in 0..self.config.snapshot_settle_rounds {
            self.next_round(Some(Directive::Hold))?;
        }
        let capture = self.table.next_cycle(self.cycle);
        self.table.push_event(Envelope::new(
            capture + 1,
            None,
            Event::Mem(MemCmd::Poke {
                addr: SNAPSHOT_CYCLE,
                data: (capture + 1).to_le_bytes().to_vec(),
                space: Space::Physical,
            }),
        ));
        self.round(capture, Some(Directive::Capture))?;
        self.next_round(Some(Directive::Persist {
            path: path.to_path_buf(),
        }))?;
        self.report.snapshots.push(path.to_path_buf());
        Ok(())
    }

    fn periodic_snapshot(&mut self) -> Result<(), ProtocolError> {
        let Some(due) = self.next_snapshot else {
            return Ok(());
        };
        if self.report.instructions < due {
            return Ok(());
        }
        let dir = self.config.snapshot_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(format!("snapshot-{:012}.json", self.report.instructions));
        self.snapshot(&path)?;
        self.next_snapshot = self
            .config
            .snapshot_period
            .map(|period| self.report.instructions + period.max(1));
        Ok(())
    }

    /// Runs until a termination condition holds.
    ///
    /// # Errors
    ///
    /// Any protocol violation; the run is over when one occurs.
    pub fn run(&mut self, cores: usize) -> Result<StopReason, ProtocolError> {
        loop {
            if let Some(reason) = self.stop_reason(cores) {
                info!(
                    ?reason,
                    cycle = self.cycle,
                    instructions = self.report.instructions,
                    "simulation stopped"
                );
                self.report.stop = Some(reason);
                return Ok(reason);
            }
            self.periodic_snapshot()?;
            self.next_round(None)?;
        }
    }

    /// Asks for statistics and runs the drain rounds.
    ///
    /// # Errors
    ///
    /// Any protocol violation while draining.
    pub fn drain(&mut self) -> Result<(), ProtocolError> {
        self.table
            .push_event(Envelope::new(self.cycle + 1, None, Event::Perf(PerfCmd::ReportStats)));
        for _ in 0..self.config.drain_rounds {
            self.next_round(None)?;
        }
        Ok(())
    }

    /// Says goodbye, joins every thread and returns the report.
    ///
    /// # Errors
    ///
    /// [`SimError::Protocol`] if a component faulted while tearing down.
    pub fn finish(mut self) -> Result<RunReport, SimError> {
        let bye = Message::Text(Control::Bye);
        for link in &self.links {
            // A component that already exited has nothing left to say.
            let _ = link.tx.send(bye.clone());
        }
        for link in std::mem::take(&mut self.links) {
            if link.handle.join().is_err() {
                warn!(service = link.name, coreid = link.coreid, "component thread panicked");
            }
        }
        let cycle = self.cycle;
        let leftovers: Vec<_> = self.inbound.try_iter().collect();
        for (index, msg) in leftovers {
            match msg {
                Message::Registers { .. } | Message::Info { .. } | Message::Fatal { .. } => {
                    self.accept(index, msg, cycle)?;
                }
                _ => {}
            }
        }
        self.report.cycles = self.cycle;
        Ok(self.report)
    }
}
