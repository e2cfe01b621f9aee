//! Component host.
//!
//! Each component runs inside a [`Host`] on a dedicated thread. The host speaks
//! the control protocol (`run`, `pause`, `bye`, `tick`, `config`, `restore`,
//! `register`) so components only implement [`Component`]. `run`, `tick` and
//! `restore` are acknowledged once everything the component said has been sent.
//! A component error is reported upstream as `fatal` and ends the thread.

use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace};

use crate::common::{CoreId, Cycle, ProtocolError};

use super::component::{Component, Outbox};
use super::message::{Control, Message, Tick};
use super::wire;

/// Coordinator-side handle of a running component.
#[derive(Debug)]
pub struct Link {
    /// Service name.
    pub name: &'static str,
    /// Core, if per-core.
    pub coreid: Option<CoreId>,
    /// Downstream channel.
    pub tx: Sender<Message>,
    /// Host thread.
    pub handle: JoinHandle<()>,
}

/// Starts `component` on its own thread.
///
/// Upstream messages are sent on `up` tagged with `index`. With `strict_frames`
/// every upstream message is checked against the frame cap.
///
/// # Errors
///
/// Fails if the OS refuses to spawn the thread.
pub fn spawn(
    index: usize,
    component: Box<dyn Component>,
    up: Sender<(usize, Message)>,
    strict_frames: bool,
) -> io::Result<Link> {
    let name = component.name();
    let coreid = component.coreid();
    let (tx, rx) = std::sync::mpsc::channel();
    let thread_name = coreid.map_or_else(|| name.to_string(), |id| format!("{name}{id}"));
    let host = Host::new(index, component, up, strict_frames);
    let handle = thread::Builder::new()
        .name(thread_name)
        .spawn(move || host.serve(&rx))?;
    Ok(Link {
        name,
        coreid,
        tx,
        handle,
    })
}

/// Runs one component and translates the control protocol.
pub struct Host {
    index: usize,
    component: Box<dyn Component>,
    up: Sender<(usize, Message)>,
    strict_frames: bool,
    running: bool,
    booted: bool,
    cycle: Cycle,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("service", &self.component.name())
            .field("coreid", &self.component.coreid())
            .field("running", &self.running)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

enum Flow {
    Continue,
    Exit,
}

impl Host {
    /// Wraps `component`; nothing runs until [`Host::serve`].
    pub fn new(
        index: usize,
        component: Box<dyn Component>,
        up: Sender<(usize, Message)>,
        strict_frames: bool,
    ) -> Self {
        Self {
            index,
            component,
            up,
            strict_frames,
            running: false,
            booted: false,
            cycle: 0,
        }
    }

    /// Processes messages until `bye`, a fatal error, or a closed channel.
    pub fn serve(mut self, rx: &Receiver<Message>) {
        for msg in rx {
            match self.handle(msg) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) => {
                    error!(service = self.component.name(), coreid = ?self.component.coreid(), "{e}");
                    let _ = self.up.send((
                        self.index,
                        Message::Fatal {
                            service: self.component.name().to_string(),
                            coreid: self.component.coreid(),
                            reason: e.to_string(),
                        },
                    ));
                    break;
                }
            }
        }
        debug!(service = self.component.name(), "host exiting");
    }

    fn outbox(&self) -> Outbox {
        Outbox::new(self.component.name(), self.component.coreid(), self.cycle)
    }

    fn send(&self, msg: Message) -> Result<(), ProtocolError> {
        if self.strict_frames {
            wire::check(&msg)?;
        }
        self.up
            .send((self.index, msg))
            .map_err(|_| ProtocolError::Disconnected("coordinator".to_string()))
    }

    fn flush(&self, out: &mut Outbox) -> Result<(), ProtocolError> {
        for msg in out.drain() {
            self.send(msg)?;
        }
        Ok(())
    }

    fn handle(&mut self, msg: Message) -> Result<Flow, ProtocolError> {
        match msg {
            Message::Text(Control::Run) => {
                let mut out = self.outbox();
                if !self.booted {
                    self.component.boot(&mut out)?;
                    self.booted = true;
                }
                self.component.resume(self.cycle);
                self.running = true;
                self.flush(&mut out)?;
                self.send(Message::Ack { cycle: self.cycle })?;
            }
            Message::Text(Control::Pause) => self.running = false,
            Message::Text(Control::Bye) => {
                let mut out = self.outbox();
                self.component.teardown(&mut out);
                self.flush(&mut out)?;
                return Ok(Flow::Exit);
            }
            Message::Tick(tick) => self.tick(tick)?,
            Message::Config { service, field, val } => {
                if service == self.component.name() {
                    self.component.configure(&field, &val)?;
                }
            }
            Message::Restore { cycle, path } => {
                if self.running {
                    return Err(ProtocolError::RestoreWhileRunning {
                        service: self.component.name().to_string(),
                    });
                }
                self.component.restore(cycle, &path)?;
                self.cycle = cycle;
                self.send(Message::Ack { cycle })?;
            }
            Message::Register(cmd) => {
                if self.component.coreid() == Some(cmd.coreid) {
                    let mut out = self.outbox();
                    self.component.register(&cmd, &mut out);
                    self.flush(&mut out)?;
                }
            }
            other => {
                return Err(ProtocolError::ComponentFault {
                    service: self.component.name().to_string(),
                    coreid: self.component.coreid(),
                    reason: format!("unexpected downstream message {other:?}"),
                });
            }
        }
        Ok(Flow::Continue)
    }

    fn tick(&mut self, tick: Tick) -> Result<(), ProtocolError> {
        self.cycle = tick.cycle;
        if self.running {
            let coreid = self.component.coreid();
            let results: Vec<_> = tick.results.into_iter().filter(|e| e.reaches(coreid)).collect();
            let events: Vec<_> = tick.events.into_iter().filter(|e| e.reaches(coreid)).collect();
            trace!(
                service = self.component.name(),
                cycle = tick.cycle,
                results = results.len(),
                events = events.len(),
                "tick"
            );
            let mut out = self.outbox();
            self.component.tick(&results, &events, &mut out)?;
            if let Some(directive) = &tick.snapshot {
                self.component.snapshot(directive, &mut out)?;
            }
            self.flush(&mut out)?;
        }
        self.send(Message::Ack { cycle: tick.cycle })
    }
}
