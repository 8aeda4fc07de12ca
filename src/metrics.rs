use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the coordinator's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RaceMetricsSnapshot {
    pub races_started: u64,
    pub races_won: u64,
    pub races_failed: u64,
    pub dedup_joins: u64,
    pub attempts_dispatched: u64,
    pub attempts_failed: u64,
    pub dispatches_suppressed: u64,
    pub escalations: u64,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RaceMetrics {
    inner: Arc<RaceMetricsInner>,
}

#[derive(Debug, Default)]
struct RaceMetricsInner {
    races_started: AtomicU64,
    races_won: AtomicU64,
    races_failed: AtomicU64,
    dedup_joins: AtomicU64,
    attempts_dispatched: AtomicU64,
    attempts_failed: AtomicU64,
    dispatches_suppressed: AtomicU64,
    escalations: AtomicU64,
}

impl RaceMetrics {
    pub(crate) fn record_race_started(&self) {
        self.inner.races_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_race_won(&self) {
        self.inner.races_won.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_race_failed(&self) {
        self.inner.races_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dedup_join(&self) {
        self.inner.dedup_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt_dispatched(&self) {
        self.inner.attempts_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt_failed(&self) {
        self.inner.attempts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_suppressed(&self) {
        self.inner.dispatches_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_escalation(&self) {
        self.inner.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RaceMetricsSnapshot {
        RaceMetricsSnapshot {
            races_started: self.inner.races_started.load(Ordering::Relaxed),
            races_won: self.inner.races_won.load(Ordering::Relaxed),
            races_failed: self.inner.races_failed.load(Ordering::Relaxed),
            dedup_joins: self.inner.dedup_joins.load(Ordering::Relaxed),
            attempts_dispatched: self.inner.attempts_dispatched.load(Ordering::Relaxed),
            attempts_failed: self.inner.attempts_failed.load(Ordering::Relaxed),
            dispatches_suppressed: self.inner.dispatches_suppressed.load(Ordering::Relaxed),
            escalations: self.inner.escalations.load(Ordering::Relaxed),
        }
    }
}
