//! Module: transaction
//! Responsibility: connect/begin/commit/rollback around one unit of work.
//! Does not own: isolation (adapter) or retry policy (none).
//! Boundary: the original callback error always wins over a rollback failure.


use crate::{
    db::adapter::SharedAdapter,
    error::Error,
    obs::{MetricsEvent, SharedSink, TxOutcome, noop_sink},
};
use std::{fmt, future::Future, sync::Arc};

///
/// TxPhase
///
/// Coordinator state. Terminal phases are `Committed` and `RolledBack`;
/// a joined call never leaves `Executing` on its own.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxPhase {
    Idle,
    Connecting,
    Began,
    Executing,
    Committed,
    RolledBack,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Began => "began",
            Self::Executing => "executing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        };
        write!(f, "{label}")
    }
}

///
/// TransactionCoordinator
///
/// Wraps a callback in one transaction on `adapter`. An adapter that is
/// already transaction-scoped is reused as is: there is no second physical
/// transaction and no savepoint, so the outermost scope decides the fate
/// of every nested write.
///

#[derive(Clone)]
pub struct TransactionCoordinator {
    adapter: SharedAdapter,
    sink: SharedSink,
}

impl TransactionCoordinator {
    #[must_use]
    pub fn new(adapter: SharedAdapter) -> Self {
        Self {
            adapter,
            sink: noop_sink(),
        }
    }

    #[must_use]
    pub fn metrics_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub async fn run<T, F, Fut>(&self, callback: F) -> Result<T, Error>
    where
        F: FnOnce(SharedAdapter) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut phase = TxPhase::Idle;

        if !self.adapter.is_connected() {
            phase = advance(phase, TxPhase::Connecting);
            self.adapter.connect().await?;
        }

        if self.adapter.in_transaction() {
            advance(phase, TxPhase::Executing);
            self.sink.record(MetricsEvent::TransactionFinish {
                outcome: TxOutcome::Joined,
            });

            return callback(Arc::clone(&self.adapter)).await;
        }

        let tx = self.adapter.begin_transaction().await?;
        phase = advance(phase, TxPhase::Began);
        phase = advance(phase, TxPhase::Executing);

        match callback(Arc::clone(&tx)).await {
            Ok(value) => {
                tx.commit_transaction().await?;
                advance(phase, TxPhase::Committed);
                self.sink.record(MetricsEvent::TransactionFinish {
                    outcome: TxOutcome::Committed,
                });

                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback_transaction().await {
                    tracing::error!(
                        error = %rollback_err,
                        original = %err,
                        "transaction rollback failed"
                    );
                }
                advance(phase, TxPhase::RolledBack);
                self.sink.record(MetricsEvent::TransactionFinish {
                    outcome: TxOutcome::RolledBack,
                });

                Err(err)
            }
        }
    }
}

/// Run `callback` inside a transaction on `adapter` without metrics.
pub async fn run_in_transaction<T, F, Fut>(adapter: &SharedAdapter, callback: F) -> Result<T, Error>
where
    F: FnOnce(SharedAdapter) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    TransactionCoordinator::new(Arc::clone(adapter))
        .run(callback)
        .await
}

fn advance(from: TxPhase, to: TxPhase) -> TxPhase {
    tracing::trace!(from = %from, to = %to, "transaction phase");
    to
}
