//! Run helpers and the probe component.

use std::sync::{Arc, Mutex};

use nebula_core::common::{CoreId, ProtocolError};
use nebula_core::config::Config;
use nebula_core::sim::component::{Component, Outbox};
use nebula_core::sim::loader::Program;
use nebula_core::sim::message::{Envelope, Event, Response};
use nebula_core::{RunReport, Simulation};

/// Installs a test subscriber once; `RUST_LOG` controls the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Single-core configuration with a cycle cap so a broken pipeline cannot hang a test.
pub fn config() -> Config {
    let mut config = Config::default();
    config.simulation.cores = 1;
    config.simulation.max_cycles = Some(50_000);
    config
}

/// Runs `program` to completion under `config`.
pub fn run(config: Config, program: Program) -> RunReport {
    init_tracing();
    Simulation::new(config, program).run().unwrap()
}

/// Everything a [`Probe`] saw, with the cycle it saw it on.
#[derive(Debug, Default)]
pub struct Recording {
    /// Delivered results.
    pub results: Vec<(u64, Envelope<Response>)>,
    /// Delivered events.
    pub events: Vec<(u64, Envelope<Event>)>,
}

impl Recording {
    /// Retired instructions in retirement order as `(iid, pc, next pc)`.
    pub fn retired(&self) -> Vec<(u64, u64, u64)> {
        self.results
            .iter()
            .filter_map(|(_, env)| match &env.body {
                Response::Retire(insn) => Some((insn.iid.unwrap_or(u64::MAX), insn.pc, insn.actual_next())),
                _ => None,
            })
            .collect()
    }

    /// Number of results with the given tag.
    pub fn count(&self, tag: &str) -> usize {
        self.results.iter().filter(|(_, env)| env.body.tag() == tag).count()
    }
}

/// A passive component that records every envelope delivered to it.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    seen: Arc<Mutex<Recording>>,
}

impl Probe {
    /// A probe and the handle its recording can be read through after the run.
    pub fn new() -> (Self, Arc<Mutex<Recording>>) {
        let probe = Self::default();
        let seen = Arc::clone(&probe.seen);
        (probe, seen)
    }
}

impl Component for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn coreid(&self) -> Option<CoreId> {
        None
    }

    fn tick(
        &mut self,
        results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        let cycle = out.cycle();
        let mut seen = self.seen.lock().unwrap();
        seen.results.extend(results.iter().cloned().map(|r| (cycle, r)));
        seen.events.extend(events.iter().cloned().map(|e| (cycle, e)));
        Ok(())
    }
}

/// Runs `program` with a probe attached and returns both the report and the recording.
pub fn run_probed(config: Config, program: Program) -> (RunReport, Recording) {
    init_tracing();
    let (probe, seen) = Probe::new();
    let report = Simulation::new(config, program)
        .with_component(Box::new(probe))
        .run()
        .unwrap();
    let recording = std::mem::take(&mut *seen.lock().unwrap());
    (report, recording)
}
