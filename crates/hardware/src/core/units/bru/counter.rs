//! Saturating counters and the direction-predictor table.
//!
//! An `n`-bit counter predicts taken when its top bit is set. Training moves it
//! one step toward the outcome and it sticks at `0` and `2^n - 1`.

use crate::config::{BranchPredictorConfig, PredictorType};

/// An `nbit`-wide saturating counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaturatingCounter {
    value: u32,
    max: u32,
}

impl SaturatingCounter {
    /// A counter of `nbit` bits starting at `value` (clamped to range).
    pub fn new(nbit: u32, value: u32) -> Self {
        let nbit = nbit.clamp(1, 16);
        let max = (1 << nbit) - 1;
        Self {
            value: value.min(max),
            max,
        }
    }

    /// A counter one step below the taken threshold.
    pub fn weakly_not_taken(nbit: u32) -> Self {
        let nbit = nbit.clamp(1, 16);
        Self::new(nbit, (1 << (nbit - 1)) - 1)
    }

    /// Current value.
    pub fn value(self) -> u32 {
        self.value
    }

    /// Top bit is set.
    pub fn taken(self) -> bool {
        self.value > self.max / 2
    }

    /// Steps toward taken, saturating.
    pub fn increment(&mut self) {
        self.value = (self.value + 1).min(self.max);
    }

    /// Steps toward not-taken, saturating.
    pub fn decrement(&mut self) {
        self.value = self.value.saturating_sub(1);
    }

    /// Trains with an outcome.
    pub fn update(&mut self, taken: bool) {
        if taken {
            self.increment();
        } else {
            self.decrement();
        }
    }
}

/// Table of saturating counters indexed by PC (bimodal) or PC and history (gshare).
#[derive(Debug, Clone)]
pub struct CounterTable {
    kind: PredictorType,
    counters: Vec<SaturatingCounter>,
    history: u64,
}

impl CounterTable {
    /// Builds the table described by `config`.
    pub fn new(config: &BranchPredictorConfig) -> Self {
        let entries = match config.predictor_type {
            PredictorType::None => 0,
            _ => config.predictor_entries.max(1).next_power_of_two(),
        };
        Self {
            kind: config.predictor_type,
            counters: vec![SaturatingCounter::weakly_not_taken(config.counter_bits); entries],
            history: 0,
        }
    }

    fn index(&self, pc: u64) -> Option<usize> {
        let mask = (self.counters.len() as u64).checked_sub(1)?;
        let idx = match self.kind {
            PredictorType::None => return None,
            PredictorType::Bimodal => (pc >> 1) & mask,
            PredictorType::Gshare => (self.history ^ (pc >> 1)) & mask,
        };
        Some(idx as usize)
    }

    /// Predicts taken for the branch at `pc`. Always taken when no table is configured.
    pub fn predict(&self, pc: u64) -> bool {
        self.index(pc).is_none_or(|i| self.counters[i].taken())
    }

    /// Trains the counter for `pc` and shifts the outcome into the global history.
    pub fn train(&mut self, pc: u64, taken: bool) {
        if let Some(i) = self.index(pc) {
            self.counters[i].update(taken);
        }
        if self.kind == PredictorType::Gshare {
            let mask = self.counters.len() as u64 - 1;
            self.history = ((self.history << 1) | u64::from(taken)) & mask;
        }
    }

    /// Counter consulted for `pc`.
    pub fn counter(&self, pc: u64) -> Option<SaturatingCounter> {
        self.index(pc).map(|i| self.counters[i])
    }
}
