//! The component contract.
//!
//! A component owns private state and reacts to one cycle at a time. The host
//! thread ([`super::service`]) feeds it the responses and events due on that
//! cycle; whatever it wants to say goes into an [`Outbox`], which stamps arrival
//! cycles and core ids so components never build envelopes by hand.

use std::path::Path;

use serde_json::Value;

use crate::common::{CoreId, Cycle, ProtocolError, RegName};
use crate::isa::Instruction;

use super::message::{Directive, Envelope, Event, Message, RegisterCommand, Response};

/// A simulated hardware block running on its own thread.
pub trait Component: Send {
    /// Service name; `config` messages address components by it.
    fn name(&self) -> &'static str;

    /// Core this instance belongs to; shared components return `None`.
    fn coreid(&self) -> Option<CoreId> {
        None
    }

    /// Called once, on the first `run`.
    fn boot(&mut self, _out: &mut Outbox) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Called on every `run`, including the first.
    fn resume(&mut self, _cycle: Cycle) {}

    /// Processes one cycle.
    ///
    /// `results` and `events` hold only the envelopes addressed to this core.
    fn tick(
        &mut self,
        results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError>;

    /// Patches one configuration field.
    fn configure(&mut self, field: &str, _val: &Value) -> Result<(), ProtocolError> {
        Err(ProtocolError::UnknownConfigField {
            service: self.name().to_string(),
            field: field.to_string(),
        })
    }

    /// An unscheduled register command.
    fn register(&mut self, _cmd: &RegisterCommand, _out: &mut Outbox) {}

    /// A snapshot phase, seen after this cycle's `tick`.
    fn snapshot(&mut self, _directive: &Directive, _out: &mut Outbox) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Reloads state from a snapshot file. Only called while paused.
    fn restore(&mut self, _cycle: Cycle, _path: &Path) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Last words before the thread exits.
    fn teardown(&mut self, _out: &mut Outbox) {}
}

/// Collects what a component says during one call.
#[derive(Debug)]
pub struct Outbox {
    service: &'static str,
    coreid: Option<CoreId>,
    cycle: Cycle,
    messages: Vec<Message>,
}

impl Outbox {
    /// An empty outbox for `service` on `cycle`.
    pub const fn new(service: &'static str, coreid: Option<CoreId>, cycle: Cycle) -> Self {
        Self {
            service,
            coreid,
            cycle,
            messages: Vec::new(),
        }
    }

    /// Cycle being processed.
    pub const fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Core of the owning component.
    pub const fn coreid(&self) -> Option<CoreId> {
        self.coreid
    }

    /// Schedules `body` `delay` cycles from now, tagged with this core.
    pub fn event(&mut self, delay: Cycle, body: Event) {
        self.event_to(delay, self.coreid, body);
    }

    /// Schedules `body` for another core (shared components answering a request).
    pub fn event_to(&mut self, delay: Cycle, coreid: Option<CoreId>, body: Event) {
        self.messages
            .push(Message::Event(Envelope::new(self.cycle + delay, coreid, body)));
    }

    /// Broadcasts `body` `delay` cycles from now, tagged with this core.
    pub fn result(&mut self, delay: Cycle, body: Response) {
        self.result_to(delay, self.coreid, body);
    }

    /// Broadcasts `body` on behalf of another core.
    pub fn result_to(&mut self, delay: Cycle, coreid: Option<CoreId>, body: Response) {
        self.messages
            .push(Message::Result(Envelope::new(self.cycle + delay, coreid, body)));
    }

    /// Announces the end of this core's program on the next cycle.
    pub fn shutdown(&mut self) {
        self.event(1, Event::Shutdown {});
    }

    /// Sends a log line to the coordinator.
    pub fn info(&mut self, text: impl Into<String>) {
        self.messages.push(Message::Info {
            service: self.service.to_string(),
            coreid: self.coreid,
            text: text.into(),
        });
    }

    /// Reports an undefined instruction.
    pub fn undefined(&mut self, insn: &Instruction) {
        self.messages.push(Message::Undefined {
            coreid: self.coreid.unwrap_or_default(),
            insn: Box::new(insn.clone()),
        });
    }

    /// Reports `n` retirements this cycle.
    pub fn committed(&mut self, n: u64) {
        self.messages.push(Message::Committed {
            coreid: self.coreid.unwrap_or_default(),
            n,
        });
    }

    /// Reports register values.
    pub fn registers(&mut self, values: Vec<(RegName, u64)>) {
        self.messages.push(Message::Registers {
            coreid: self.coreid.unwrap_or_default(),
            values,
        });
    }

    /// Nothing was said.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Takes everything said so far.
    pub fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}
