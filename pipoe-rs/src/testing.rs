use embedded_hal::delay::DelayNs;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Delay that only records how long it was asked to wait. Clones share the total.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingDelay {
    total_ns: Arc<AtomicU64>,
}

impl RecordingDelay {
    pub(crate) fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::SeqCst)
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(ns as u64, Ordering::SeqCst);
    }
}
