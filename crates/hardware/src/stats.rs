//! Simulation statistics collection and reporting.
//!
//! Statistics are kept in two places:
//! 1. **Counters:** Each component accumulates its own [`Counters`] and flushes them as
//!    `stats` events when it sees `perf report_stats`.
//! 2. **Collector:** The [`StatsCollector`] component folds those events into a
//!    [`StatsTree`] keyed by core, service and counter, and writes it out at teardown.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::{CoreId, ProtocolError};
use crate::sim::component::{Component, Outbox};
use crate::sim::message::{Envelope, Event, Response, StatKind, StatsReport};

/// Counters local to one component.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    flat: BTreeMap<&'static str, u64>,
    histo: BTreeMap<(&'static str, String), u64>,
}

impl Counters {
    /// Adds one to `name`.
    pub fn bump(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    /// Adds `n` to `name`.
    pub fn add(&mut self, name: &'static str, n: u64) {
        *self.flat.entry(name).or_default() += n;
    }

    /// Adds one to bucket `datum` of histogram `name`.
    pub fn histo(&mut self, name: &'static str, datum: impl fmt::Display) {
        *self.histo.entry((name, datum.to_string())).or_default() += 1;
    }

    /// Current value of a flat counter.
    pub fn get(&self, name: &str) -> u64 {
        self.flat.get(name).copied().unwrap_or_default()
    }

    /// Sends everything accumulated so far as `stats` events and starts over.
    pub fn report(&mut self, service: &str, out: &mut Outbox) {
        for (name, increment) in std::mem::take(&mut self.flat) {
            out.event(1, Event::Stats(StatsReport {
                service: service.to_string(),
                kind: StatKind::Flat,
                name: name.to_string(),
                data: None,
                increment,
            }));
        }
        for ((name, datum), increment) in std::mem::take(&mut self.histo) {
            out.event(1, Event::Stats(StatsReport {
                service: service.to_string(),
                kind: StatKind::Histo,
                name: name.to_string(),
                data: Some(datum),
                increment,
            }));
        }
    }
}

/// A collected statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Plain counter.
    Flat(u64),
    /// Histogram buckets.
    Histo(BTreeMap<String, u64>),
}

/// Statistics by core (`"core0"`, ..., or `"shared"`), then service, then name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsTree(pub BTreeMap<String, BTreeMap<String, BTreeMap<String, StatValue>>>);

impl StatsTree {
    fn scope(coreid: Option<CoreId>) -> String {
        coreid.map_or_else(|| "shared".to_string(), |id| format!("core{id}"))
    }

    /// Folds one report into the tree.
    pub fn record(&mut self, coreid: Option<CoreId>, report: &StatsReport) {
        let names = self
            .0
            .entry(Self::scope(coreid))
            .or_default()
            .entry(report.service.clone())
            .or_default();
        match (report.kind, &report.data) {
            (StatKind::Histo, Some(datum)) => {
                let slot = names
                    .entry(report.name.clone())
                    .or_insert_with(|| StatValue::Histo(BTreeMap::new()));
                if let StatValue::Histo(buckets) = slot {
                    *buckets.entry(datum.clone()).or_default() += report.increment;
                }
            }
            _ => {
                let slot = names.entry(report.name.clone()).or_insert(StatValue::Flat(0));
                if let StatValue::Flat(n) = slot {
                    *n += report.increment;
                }
            }
        }
    }

    /// Value of a flat counter, zero if never reported.
    pub fn flat(&self, coreid: Option<CoreId>, service: &str, name: &str) -> u64 {
        match self
            .0
            .get(&Self::scope(coreid))
            .and_then(|s| s.get(service))
            .and_then(|n| n.get(name))
        {
            Some(StatValue::Flat(n)) => *n,
            _ => 0,
        }
    }

    /// Human-readable listing.
    pub fn render(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "==========================================================");
        let _ = writeln!(text, "NEBULA SIMULATION STATISTICS");
        let _ = writeln!(text, "==========================================================");
        for (scope, services) in &self.0 {
            let _ = writeln!(text, "{}", scope.to_uppercase());
            for (service, names) in services {
                for (name, value) in names {
                    match value {
                        StatValue::Flat(n) => {
                            let _ = writeln!(text, "  {:<28} {n}", format!("{service}.{name}"));
                        }
                        StatValue::Histo(buckets) => {
                            for (datum, n) in buckets {
                                let _ = writeln!(text, "  {:<28} {n}", format!("{service}.{name}[{datum}]"));
                            }
                        }
                    }
                }
            }
            let _ = writeln!(text, "----------------------------------------------------------");
        }
        text
    }
}

/// Gathers `stats` events from every component.
#[derive(Debug, Default)]
pub struct StatsCollector {
    tree: StatsTree,
    output: Option<PathBuf>,
}

impl StatsCollector {
    /// A collector writing JSON to `output` at teardown, or logging a summary when `None`.
    pub fn new(output: Option<PathBuf>) -> Self {
        Self {
            tree: StatsTree::default(),
            output,
        }
    }

    /// Everything collected so far.
    pub fn tree(&self) -> &StatsTree {
        &self.tree
    }
}

impl Component for StatsCollector {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn tick(
        &mut self,
        _results: &[Envelope<Response>],
        events: &[Envelope<Event>],
        _out: &mut Outbox,
    ) -> Result<(), ProtocolError> {
        for env in events {
            if let Event::Stats(report) = &env.body {
                self.tree.record(env.coreid, report);
            }
        }
        Ok(())
    }

    fn teardown(&mut self, _out: &mut Outbox) {
        match &self.output {
            Some(path) => match serde_json::to_string_pretty(&self.tree) {
                Ok(text) => {
                    if let Err(e) = fs::write(path, text) {
                        warn!(path = %path.display(), "failed to write statistics: {e}");
                    }
                }
                Err(e) => warn!("failed to encode statistics: {e}"),
            },
            None => info!("\n{}", self.tree.render()),
        }
    }
}
