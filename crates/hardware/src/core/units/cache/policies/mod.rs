//! Cache Replacement Policies.
//!
//! Victim selection for full sets. Invalid ways are always filled first by the
//! cache itself; a policy is only consulted when every way is valid.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used.
//! - `Random`: xorshift-driven uniform choice.

/// Least Recently Used replacement policy.
pub mod lru;

/// Random replacement policy.
pub mod random;

pub use lru::LruPolicy;
pub use random::RandomPolicy;

/// Trait for cache replacement policies.
pub trait ReplacementPolicy: Send {
    /// Records an access (hit or fill) to `way` of `set`.
    fn touch(&mut self, set: usize, way: usize);

    /// The way a fill into `set` would replace. Does not change any state.
    fn victim(&self, set: usize) -> usize;

    /// Records that `way` of `set` has just been replaced.
    fn replaced(&mut self, set: usize, way: usize) {
        self.touch(set, way);
    }
}
