//! Observability: metrics events, sinks, and counters.
//!
//! Structured logs go through `tracing` directly at the call sites; this
//! module only owns the metrics boundary.

pub mod metrics;
pub mod sink;

pub use metrics::{CounterSink, MetricsSnapshot};
pub use sink::{MetricsEvent, MetricsSink, NoopSink, SharedSink, TxOutcome, noop_sink};
