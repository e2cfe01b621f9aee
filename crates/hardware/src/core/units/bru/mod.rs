//! Branch prediction structures.
//!
//! A [`Btac`](btac::Btac) supplies targets for branches seen taken before, and a
//! [`CounterTable`](counter::CounterTable) of saturating counters decides whether
//! a BTAC hit is followed. Both are trained at retirement by the predictor stage.

/// Branch target address cache.
pub mod btac;

/// Saturating counters and the direction table.
pub mod counter;

pub use btac::{Btac, BtacEntry};
pub use counter::{CounterTable, SaturatingCounter};
