//! Per-gate delivery counters.
//!
//! Producers never learn about dropped events; these counters are how drops
//! become observable.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of one gate.
#[derive(Debug, Default)]
pub(crate) struct GateStats {
    accepted: AtomicU64,
    dropped_full: AtomicU64,
    dropped_idle: AtomicU64,
    delivered: AtomicU64,
    listener_panics: AtomicU64,
}

impl GateStats {
    #[inline]
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped_full(&self) {
        self.dropped_full.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped_idle(&self) {
        self.dropped_idle.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_listener_panic(&self) {
        self.listener_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_idle: self.dropped_idle.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a gate's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events accepted into the queue.
    pub accepted: u64,
    /// Events dropped because the queue was full.
    pub dropped_full: u64,
    /// Events dropped because the dispatch worker was not running.
    pub dropped_idle: u64,
    /// Events whose delivery to all listeners completed.
    pub delivered: u64,
    /// Listener callbacks that panicked.
    pub listener_panics: u64,
}

impl StatsSnapshot {
    /// Total events lost before reaching the dispatch loop.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_idle
    }
}
