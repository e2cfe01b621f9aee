//! Random Replacement Policy.
//!
//! Picks a victim uniformly with an xorshift generator. The seed is fixed so
//! runs are reproducible; the generator only advances when a line is replaced.

use super::ReplacementPolicy;

/// Seed of the xorshift state.
const SEED: u64 = 123_456_789;

/// Random Policy state.
pub struct RandomPolicy {
    ways: usize,
    state: u64,
}

impl RandomPolicy {
    /// Creates a policy for caches with `ways` ways.
    pub fn new(ways: usize) -> Self {
        Self { ways, state: SEED }
    }

    fn next(state: u64) -> u64 {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn touch(&mut self, _set: usize, _way: usize) {}

    fn victim(&self, _set: usize) -> usize {
        (Self::next(self.state) % self.ways as u64) as usize
    }

    fn replaced(&mut self, _set: usize, _way: usize) {
        self.state = Self::next(self.state);
    }
}
