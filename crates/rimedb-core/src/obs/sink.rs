//! Metrics sink boundary.
//!
//! Pipeline and transaction code never touch counters directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.

use crate::db::Operation;
use std::sync::Arc;

///
/// TxOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxOutcome {
    Committed,
    RolledBack,
    Joined,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        model: &'a str,
        operation: Operation,
    },
    ExecFinish {
        model: &'a str,
        operation: Operation,
        rows: u64,
        ok: bool,
    },
    TransactionFinish {
        outcome: TxOutcome,
    },
    ComputeFailed {
        model: &'a str,
        field: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent<'_>);
}

///
/// NoopSink
/// Installed when a client has no sink configured.
///

pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _event: MetricsEvent<'_>) {}
}

/// Shared handle type carried by clients.
pub type SharedSink = Arc<dyn MetricsSink>;

#[must_use]
pub fn noop_sink() -> SharedSink {
    Arc::new(NoopSink)
}
