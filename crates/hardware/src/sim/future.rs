//! Future-event table.
//!
//! The coordinator's only timing structure: envelopes grouped by arrival cycle.
//! Time advances by jumping to the smallest key, so idle stretches cost nothing.

use std::collections::BTreeMap;

use crate::common::Cycle;

use super::message::{Envelope, Event, Response};

/// Everything due on one cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Pending {
    /// Responses, in the order they were scheduled.
    pub results: Vec<Envelope<Response>>,
    /// Events, in the order they were scheduled.
    pub events: Vec<Envelope<Event>>,
}

impl Pending {
    /// Nothing is due.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.events.is_empty()
    }
}

/// Envelopes keyed by arrival cycle.
#[derive(Debug, Default)]
pub struct FutureTable {
    entries: BTreeMap<Cycle, Pending>,
}

impl FutureTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an event.
    pub fn push_event(&mut self, env: Envelope<Event>) {
        self.entries.entry(env.arrival).or_default().events.push(env);
    }

    /// Schedules a response.
    pub fn push_result(&mut self, env: Envelope<Response>) {
        self.entries.entry(env.arrival).or_default().results.push(env);
    }

    /// The next cycle to simulate after `cycle`: the earliest scheduled arrival,
    /// or `cycle + 1` when nothing is scheduled.
    pub fn next_cycle(&self, cycle: Cycle) -> Cycle {
        self.entries
            .range(cycle + 1..)
            .next()
            .map_or(cycle + 1, |(&at, _)| at)
    }

    /// Removes and returns what is due on `cycle`.
    pub fn take(&mut self, cycle: Cycle) -> Pending {
        self.entries.remove(&cycle).unwrap_or_default()
    }

    /// Number of scheduled cycles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
