//! Engine counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters, updated lock-free from every producer thread.
#[derive(Debug, Default)]
pub struct EngineStats {
    submitted: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    runs_released: AtomicU64,
    items_released: AtomicU64,
    groups_completed: AtomicU64,
    groups_expired: AtomicU64,
    items_discarded: AtomicU64,
    dispatch_failures: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub runs_released: u64,
    pub items_released: u64,
    pub groups_completed: u64,
    pub groups_expired: u64,
    pub items_discarded: u64,
    pub dispatch_failures: u64,
}

impl EngineStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_run(&self, items: usize) {
        self.runs_released.fetch_add(1, Ordering::Relaxed);
        self.items_released.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.groups_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self) {
        self.groups_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, items: usize) {
        self.items_discarded.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            runs_released: self.runs_released.load(Ordering::Relaxed),
            items_released: self.items_released.load(Ordering::Relaxed),
            groups_completed: self.groups_completed.load(Ordering::Relaxed),
            groups_expired: self.groups_expired.load(Ordering::Relaxed),
            items_discarded: self.items_discarded.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = EngineStats::default();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_accepted();
        stats.record_rejected();
        stats.record_run(3);

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.runs_released, 1);
        assert_eq!(snap.items_released, 3);
        assert_eq!(snap.dispatch_failures, 0);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let json = serde_json::to_string(&StatsSnapshot::default()).unwrap();
        assert!(json.contains("items_released"));
    }
}
