//! Liveness watchdog.
//!
//! Watches one event tag and one result tag on its core. If either goes quiet for
//! longer than its configured number of cycles the core is declared hung: the
//! watchdog logs why and shuts the core down.

use serde_json::Value;
use tracing::warn;

use crate::common::{CoreId, Cycle, ProtocolError};
use crate::config::WatchdogConfig;
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, Response};

/// Per-core liveness monitor.
#[derive(Debug)]
pub struct Watchdog {
    coreid: CoreId,
    config: WatchdogConfig,
    last_event: Cycle,
    last_result: Cycle,
    tripped: bool,
}

impl Watchdog {
    /// Creates an armed watchdog.
    pub fn new(coreid: CoreId, config: &WatchdogConfig) -> Self {
        Self {
            coreid,
            config: config.clone(),
            last_event: 0,
            last_result: 0,
            tripped: false,
        }
    }

    /// The watchdog has fired.
    pub const fn tripped(&self) -> bool {
        self.tripped
    }

    fn expired(name: Option<&String>, limit: Option<u64>, last: Cycle, now: Cycle) -> Option<(String, u64)> {
        let name = name?;
        let limit = limit?;
        (now.saturating_sub(last) > limit).then(|| (name.clone(), limit))
    }
}

impl Component for Watchdog {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    fn coreid(&self) -> Option<CoreId> {
        Some(self.coreid)
    }

    fn resume(&mut self, cycle: Cycle) {
        self.last_event = cycle;
        self.last_result = cycle;
        self.tripped = false;
    }

    fn tick(
        &mut self,
        results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        let now = out.cycle();
        let event_name = self.config.event_name.as_deref();
        let result_name = self.config.result_name.as_deref();
        if events.iter().any(|e| Some(e.body.tag()) == event_name) {
            self.last_event = now;
        }
        if results.iter().any(|r| Some(r.body.tag()) == result_name) {
            self.last_result = now;
        }
        if self.tripped {
            return Ok(());
        }
        let expired = Self::expired(self.config.event_name.as_ref(), self.config.event_cycles, self.last_event, now)
            .or_else(|| {
                Self::expired(self.config.result_name.as_ref(), self.config.result_cycles, self.last_result, now)
            });
        if let Some((name, limit)) = expired {
            warn!(coreid = self.coreid, name, limit, cycle = now, "watchdog tripped");
            out.info(format!("watchdog: no {name} for more than {limit} cycles (cycle {now})"));
            out.shutdown();
            self.tripped = true;
        }
        Ok(())
    }

    fn configure(&mut self, field: &str, val: &Value) -> Result<(), ProtocolError> {
        let name = self.name();
        crate::config::patch(&mut self.config, name, field, val)
    }
}
