use barvault_warehouse::WarehouseError;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::error;

use super::report::{NotSaved, NotSavedReason};
use crate::{InstrumentSeed, StopReason, StopSignal, SymbolId};

/// What the writer reports on its side channel.
#[derive(Debug, Error)]
pub enum WriteFailure {
    /// Opening, migrating or preparing the store failed. Nothing will be written.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] WarehouseError),

    /// The transaction for one instrument was rolled back.
    #[error("failed to persist {} ({id}): {error}", .seed.symbol)]
    Rejected {
        seed: InstrumentSeed,
        id: SymbolId,
        #[source]
        error: WarehouseError,
        /// Rejections in a row, including this one.
        consecutive: u32,
    },
}

/// When per-instrument write failures stop the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    /// `None` keeps going no matter how many instruments fail.
    pub max_consecutive_failures: Option<u32>,
}

impl FailurePolicy {
    pub const fn never_escalate() -> Self {
        Self {
            max_consecutive_failures: None,
        }
    }

    pub const fn stop_after(consecutive: u32) -> Self {
        Self {
            max_consecutive_failures: Some(consecutive),
        }
    }

    fn escalates(self, consecutive: u32) -> bool {
        self.max_consecutive_failures
            .is_some_and(|limit| consecutive >= limit)
    }
}

/// Sole consumer of the writer's failure stream.
pub struct FailureSink {
    policy: FailurePolicy,
    stop: StopSignal,
}

impl FailureSink {
    pub fn new(policy: FailurePolicy, stop: StopSignal) -> Self {
        Self { policy, stop }
    }

    /// Log every failure until the writer closes the stream, then raise
    /// [`StopReason::WriterFinished`] (a no-op if something raised first).
    pub async fn run(self, mut failures: mpsc::UnboundedReceiver<WriteFailure>) -> Vec<NotSaved> {
        let mut not_saved = Vec::new();

        while let Some(failure) = failures.recv().await {
            match failure {
                WriteFailure::Unavailable(cause) => {
                    error!(error = %cause, "storage unavailable, stopping intake");
                    self.stop.raise(StopReason::PersistenceUnavailable);
                }
                WriteFailure::Rejected {
                    seed,
                    id,
                    error: cause,
                    consecutive,
                } => {
                    error!(
                        symbol = %seed.symbol,
                        exchange = %seed.exchange,
                        id = %id,
                        consecutive,
                        error = %cause,
                        "instrument not persisted"
                    );
                    not_saved.push(NotSaved::new(seed, NotSavedReason::PersistFailed));
                    if self.policy.escalates(consecutive) {
                        self.stop
                            .raise(StopReason::PersistenceFailing { consecutive });
                    }
                }
            }
        }

        self.stop.raise(StopReason::WriterFinished);
        not_saved
    }
}
