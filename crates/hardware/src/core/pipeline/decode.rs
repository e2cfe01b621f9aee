//! Decode Stage: byte windows to instructions.
//!
//! Decode keeps a byte buffer that starts at `pc`. Contiguous windows from Fetch
//! are appended; a window at any other address restarts the buffer there. Each
//! cycle at most `max_bytes_to_decode` bytes and `max_instructions` instructions
//! are decoded and sent to Issue, and the consumed bytes are credited back to
//! Fetch. An instruction straddling the end of the buffer waits for more bytes.

use serde_json::Value;

use crate::common::{CoreId, ProtocolError};
use crate::config::DecodeConfig;
use crate::isa::decode::decode;
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, Response};
use crate::stats::Counters;

/// Decode stage of one core.
#[derive(Debug)]
pub struct DecodeStage {
    coreid: CoreId,
    config: DecodeConfig,
    buffer: Vec<u8>,
    pc: u64,
    next: u64,
    redirect: Option<u64>,
    stats: Counters,
}

impl DecodeStage {
    /// Creates the stage with an empty buffer.
    pub fn new(coreid: CoreId, config: &DecodeConfig) -> Self {
        Self {
            coreid,
            config: config.clone(),
            buffer: Vec::new(),
            pc: 0,
            next: 0,
            redirect: None,
            stats: Counters::default(),
        }
    }

    /// Appends a window, restarting the buffer if it is not contiguous.
    ///
    /// Bytes dropped by a restart are credited back to Fetch.
    fn accept(&mut self, addr: u64, data: &[u8], out: &mut Outbox) {
        if let Some(target) = self.redirect {
            if addr != target {
                return;
            }
            self.redirect = None;
        }
        if addr != self.next {
            if !self.buffer.is_empty() {
                out.result(1, Response::Decoded {
                    bytes: self.buffer.len() as u64,
                });
            }
            self.buffer.clear();
            self.pc = addr;
            self.next = addr;
        }
        self.buffer.extend_from_slice(data);
        self.next += data.len() as u64;
    }

    fn decode(&mut self, out: &mut Outbox) {
        let window = self.buffer.len().min(self.config.max_bytes_to_decode);
        let insns = decode(&self.buffer[..window], self.pc, self.config.max_instructions);
        let consumed: u64 = insns.iter().map(|i| i.size).sum();
        for insn in insns {
            self.stats.histo("size", insn.size);
            out.event(1, Event::Issue { insn: Box::new(insn) });
        }
        if consumed > 0 {
            let _ = self.buffer.drain(..consumed as usize);
            self.pc += consumed;
            self.stats.add("bytes", consumed);
            out.result(1, Response::Decoded { bytes: consumed });
        }
    }
}

impl Component for DecodeStage {
    fn name(&self) -> &'static str {
        "decode"
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
            if let Response::Mispredict { insn } = &env.body {
                let target = insn.actual_next();
                self.buffer.clear();
                self.pc = target;
                self.next = target;
                self.redirect = Some(target);
                mispredict = true;
            }
        }
        for env in events {
            match &env.body {
                Event::Decode { addr, data } if !mispredict => self.accept(*addr, data, out),
                Event::Perf(_) => self.stats.report(self.name(), out),
                _ => {}
            }
        }
        self.decode(out);
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)
    }
}
