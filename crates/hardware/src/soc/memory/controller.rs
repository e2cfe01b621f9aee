//! Memory controller latency model.
//!
//! Main memory answers every peek after the latency its controller reports.

/// Reports how long a main-memory access takes.
pub trait MemoryController: Send {
    /// Cycles until data for `addr` is available.
    fn access_latency(&mut self, addr: u64) -> u64;
}

/// Fixed latency for every access.
#[derive(Debug, Clone, Copy)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// A controller answering after `latency` cycles (at least one).
    pub fn new(latency: u64) -> Self {
        Self {
            latency: latency.max(1),
        }
    }
}

impl MemoryController for SimpleController {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.latency
    }
}
