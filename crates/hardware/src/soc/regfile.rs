//! Architectural register file.
//!
//! One instance per core holds `%pc`, `x0`..`x31` and `f0`..`f31`. Scheduled
//! `register` events come from Commit (writes) and Issue (reads); unscheduled
//! register commands from the coordinator are applied on arrival. At `capture`
//! the file images itself into its snapshot region of main memory.

use std::path::Path;

use tracing::debug;

use crate::common::reg::NUM_SLOTS;
use crate::common::{CoreId, Cycle, ProtocolError, RegName};
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Directive, Envelope, Event, MemCmd, RegisterCmd, RegisterCommand, Response, Space};
use crate::sim::snapshot::{Snapshot, encode_registers, register_image};

/// Register file of one core.
#[derive(Debug)]
pub struct RegisterFile {
    coreid: CoreId,
    regs: [u64; NUM_SLOTS],
}

impl RegisterFile {
    /// All registers zero.
    pub const fn new(coreid: CoreId) -> Self {
        Self {
            coreid,
            regs: [0; NUM_SLOTS],
        }
    }

    /// Current value of `name`.
    pub const fn read(&self, name: RegName) -> u64 {
        self.regs[name.slot()]
    }

    /// Writes `name`; `x0` stays zero.
    pub fn write(&mut self, name: RegName, value: u64) {
        if name != RegName::X(0) {
            self.regs[name.slot()] = value;
        }
    }

    fn dump(&self) -> Vec<(RegName, u64)> {
        RegName::all().map(|name| (name, self.read(name))).collect()
    }
}

impl Component for RegisterFile {
    fn name(&self) -> &'static str {
        "regfile"
    }

    fn coreid(&self) -> Option<CoreId> {
        Some(self.coreid)
    }

    fn tick(
        &mut self,
        _results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        // Writes land before reads of the same cycle.
        for env in events {
            if let Event::Register(RegisterCmd::Set { name, data }) = env.body {
                self.write(name, data);
            }
        }
        for env in events {
            if let Event::Register(RegisterCmd::Get { name }) = env.body {
                out.result(1, Response::Register {
                    name,
                    data: self.read(name),
                });
            }
        }
        Ok(())
    }

    fn register(&mut self, cmd: &RegisterCommand, out: &mut Outbox) {
        match cmd.op {
            RegisterCmd::Set { name, data } => {
                debug!(coreid = self.coreid, %name, data = format_args!("{data:#x}"), "register set");
                self.write(name, data);
            }
            RegisterCmd::Get { name } => out.registers(vec![(name, self.read(name))]),
        }
    }

    fn snapshot(&mut self, directive: &Directive, out: &mut Outbox) -> Result<(), ProtocolError> {
        if *directive == Directive::Capture {
            out.event(1, Event::Mem(MemCmd::Poke {
                addr: register_image(self.coreid),
                data: encode_registers(&self.regs),
                space: Space::Physical,
            }));
        }
        Ok(())
    }

    fn restore(&mut self, _cycle: Cycle, path: &Path) -> Result<(), ProtocolError> {
        let snapshot = Snapshot::load(path)?;
        for (name, value) in snapshot.registers(self.coreid) {
            self.write(name, value);
        }
        Ok(())
    }

    fn teardown(&mut self, out: &mut Outbox) {
        out.registers(self.dump());
    }
}
