/*!
 * Core Statistics
 * Lock-free counters updated by dispatch and the read path
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one event core
///
/// Relaxed increments only; a snapshot is a best-effort view, not a
/// consistent cut across counters.
#[derive(Debug, Default)]
pub struct CoreStats {
    dispatch_passes: AtomicU64,
    events_delivered: AtomicU64,
    events_coalesced: AtomicU64,
    events_dropped: AtomicU64,
    reads: AtomicU64,
    read_timeouts: AtomicU64,
    resets: AtomicU64,
    bus_errors: AtomicU64,
}

/// Point-in-time copy of [`CoreStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub dispatch_passes: u64,
    pub events_delivered: u64,
    pub events_coalesced: u64,
    pub events_dropped: u64,
    pub reads: u64,
    pub read_timeouts: u64,
    pub resets: u64,
    pub bus_errors: u64,
}

impl CoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_dispatch(&self, delivered: u64, coalesced: u64, dropped: u64) {
        self.dispatch_passes.fetch_add(1, Ordering::Relaxed);
        if delivered > 0 {
            self.events_delivered.fetch_add(delivered, Ordering::Relaxed);
        }
        if coalesced > 0 {
            self.events_coalesced.fetch_add(coalesced, Ordering::Relaxed);
        }
        if dropped > 0 {
            self.events_dropped.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self) {
        self.read_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bus_error(&self) {
        self.bus_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatch_passes: self.dispatch_passes.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_coalesced: self.events_coalesced.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            bus_errors: self.bus_errors.load(Ordering::Relaxed),
        }
    }
}
