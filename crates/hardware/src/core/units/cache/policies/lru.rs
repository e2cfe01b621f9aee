//! Least Recently Used (LRU) Replacement Policy.
//!
//! Keeps one usage stack per set. An access moves the way to the top (most
//! recently used); the bottom of the stack is the victim.
//!
//! - `touch()`: O(W) in the associativity
//! - `victim()`: O(1)

use super::ReplacementPolicy;

/// LRU Policy state.
pub struct LruPolicy {
    /// Usage stacks, one per set. Index 0 is MRU, last index is LRU.
    usage: Vec<Vec<usize>>,
}

impl LruPolicy {
    /// Creates a policy for `sets` sets of `ways` ways. Way 0 starts as MRU.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    fn victim(&self, set: usize) -> usize {
        self.usage[set].last().copied().unwrap_or(0)
    }
}
