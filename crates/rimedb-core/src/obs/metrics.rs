//! Process-local counters backing the default metrics sink.

use crate::obs::sink::{MetricsEvent, MetricsSink, TxOutcome};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

///
/// MetricsSnapshot
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub exec_calls: u64,
    pub exec_errors: u64,
    pub rows_returned: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub joined_transactions: u64,
    pub compute_failures: u64,
}

///
/// CounterSink
///
/// Lock-free counting sink. Cheap enough to leave installed in production.
///

#[derive(Debug, Default)]
pub struct CounterSink {
    exec_calls: AtomicU64,
    exec_errors: AtomicU64,
    rows_returned: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    joined_transactions: AtomicU64,
    compute_failures: AtomicU64,
}

impl CounterSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exec_calls: self.exec_calls.load(Ordering::Relaxed),
            exec_errors: self.exec_errors.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            joined_transactions: self.joined_transactions.load(Ordering::Relaxed),
            compute_failures: self.compute_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.exec_calls,
            &self.exec_errors,
            &self.rows_returned,
            &self.commits,
            &self.rollbacks,
            &self.joined_transactions,
            &self.compute_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl MetricsSink for CounterSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { .. } => {
                self.exec_calls.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::ExecFinish { rows, ok, .. } => {
                self.rows_returned.fetch_add(rows, Ordering::Relaxed);
                if !ok {
                    self.exec_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            MetricsEvent::TransactionFinish { outcome } => {
                let counter = match outcome {
                    TxOutcome::Committed => &self.commits,
                    TxOutcome::RolledBack => &self.rollbacks,
                    TxOutcome::Joined => &self.joined_transactions,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            MetricsEvent::ComputeFailed { .. } => {
                self.compute_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
