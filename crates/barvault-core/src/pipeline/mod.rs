//! # Ingestion Pipeline
//!
//! One orchestrating task, one blocking writer thread and one failure sink:
//!
//! ```text
//! seeds ─▶ Orchestrator ─(resolve, fetch: gated)─▶ bounded queue ─▶ Writer ─▶ DuckDB
//!              ▲                                                      │
//!              └──────────── StopSignal ◀── FailureSink ◀─ failures ──┘
//! ```
//!
//! Between instruments the orchestrator checks, in order: session expiry
//! (renew without advancing), the stop signal (end the loop), then processes
//! the next seed. In-flight calls are never interrupted.

mod failure;
mod report;
mod writer;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use barvault_warehouse::WarehouseConfig;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};

pub use failure::{FailurePolicy, FailureSink, WriteFailure};
pub use report::{IngestReport, NotSaved, NotSavedReason, RunOutcome};
pub use writer::{Writer, WriterSummary};

use crate::session::SessionKeeper;
use crate::source::MarketSource;
use crate::{
    Fetcher, Instrument, InstrumentSeed, RateGate, Resolver, StopReason, StopSignal,
    ValidationError,
};

const DEFAULT_CALL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_LOOKBACK_YEARS: u8 = 5;
const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Minimum spacing between any two calls to the market source.
    pub call_interval: Duration,
    pub lookback_years: u8,
    /// Completed instruments buffered ahead of the writer.
    pub queue_capacity: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            call_interval: DEFAULT_CALL_INTERVAL,
            lookback_years: DEFAULT_LOOKBACK_YEARS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            failure_policy: FailurePolicy::never_escalate(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.call_interval.is_zero() {
            return Err(ValidationError::ZeroSetting {
                field: "call_interval",
            });
        }
        if self.lookback_years == 0 {
            return Err(ValidationError::ZeroSetting {
                field: "lookback_years",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::ZeroSetting {
                field: "queue_capacity",
            });
        }
        if self.failure_policy.max_consecutive_failures == Some(0) {
            return Err(ValidationError::ZeroSetting {
                field: "max_consecutive_failures",
            });
        }
        Ok(())
    }
}

/// Drives seeds through resolve, fetch and enqueue, then shuts the writer
/// and failure sink down and reports what was not saved.
pub struct Orchestrator {
    resolver: Resolver,
    fetcher: Fetcher,
    session: Arc<dyn SessionKeeper>,
    config: PipelineConfig,
    stop: StopSignal,
}

impl Orchestrator {
    pub fn new(
        resolver: Resolver,
        fetcher: Fetcher,
        session: Arc<dyn SessionKeeper>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            session,
            config,
            stop: StopSignal::new(),
        }
    }

    /// Build a resolver and fetcher sharing one [`RateGate`] over `source`.
    pub fn with_source(
        source: Arc<dyn MarketSource>,
        session: Arc<dyn SessionKeeper>,
        config: PipelineConfig,
    ) -> Self {
        let gate = RateGate::new(config.call_interval);
        let resolver = Resolver::new(Arc::clone(&source), gate.clone());
        let fetcher = Fetcher::new(source, gate, config.lookback_years);
        Self::new(resolver, fetcher, session, config)
    }

    /// Handle for raising a stop from outside the run, e.g. on Ctrl-C.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub async fn run(self, seeds: Vec<InstrumentSeed>, warehouse: WarehouseConfig) -> IngestReport {
        let order = InputOrder::of(&seeds);
        let (failures, failures_rx) = mpsc::unbounded_channel();
        let sink = FailureSink::new(self.config.failure_policy, self.stop.clone());
        let sink_task = tokio::spawn(sink.run(failures_rx));

        let mut pending: VecDeque<InstrumentSeed> = seeds.into();
        let mut not_saved = Vec::new();
        let mut writer_failed = false;
        let mut written = 0;

        // The store must be usable before the first source call.
        match tokio::task::spawn_blocking(move || Writer::open(warehouse)).await {
            Ok(Ok(writer)) => {
                let (queue, queue_rx) = mpsc::channel(self.config.queue_capacity.max(1));
                let writer_task =
                    tokio::task::spawn_blocking(move || writer.run(queue_rx, failures));

                self.intake(&mut pending, &mut not_saved, queue).await;

                match settle_writer(writer_task.await, &self.stop) {
                    Some(count) => written = count,
                    None => writer_failed = true,
                }
            }
            Ok(Err(cause)) => {
                if let Err(mpsc::error::SendError(failure)) =
                    failures.send(WriteFailure::Unavailable(cause))
                {
                    error!(error = %failure, "failure sink is gone");
                    self.stop.raise(StopReason::PersistenceUnavailable);
                }
                drop(failures);
            }
            Err(cause) => {
                error!(error = %cause, "writer failed to start");
                self.stop.raise(StopReason::PersistenceUnavailable);
                writer_failed = true;
                drop(failures);
            }
        }

        not_saved.extend(
            pending
                .into_iter()
                .map(|seed| NotSaved::new(seed, NotSavedReason::Skipped)),
        );

        let raised = self.stop.wait().await;
        let reason = if writer_failed {
            StopReason::PersistenceUnavailable
        } else {
            raised
        };
        match sink_task.await {
            Ok(failed) => not_saved.extend(failed),
            Err(cause) => error!(error = %cause, "failure sink task failed"),
        }
        order.sort(&mut not_saved);

        let outcome = if reason.is_abort() {
            RunOutcome::Aborted { reason }
        } else {
            RunOutcome::Completed
        };
        info!(saved = written, not_saved = not_saved.len(), ?outcome, "ingestion finished");

        IngestReport {
            saved: written,
            not_saved,
            outcome,
        }
    }

    /// Resolve, fetch and enqueue seeds until the list is empty or a stop is
    /// raised. Dropping `queue` on return lets the writer drain and finish.
    async fn intake(
        &self,
        pending: &mut VecDeque<InstrumentSeed>,
        not_saved: &mut Vec<NotSaved>,
        queue: mpsc::Sender<Instrument>,
    ) {
        let mut renewed_at_cursor = false;
        info!(instruments = pending.len(), "ingestion started");

        while !pending.is_empty() {
            if !renewed_at_cursor && self.session.expiry_notified() {
                renewed_at_cursor = true;
                info!("session about to expire, renewing");
                if let Err(cause) = self.session.renew().await {
                    error!(error = %cause, "session renewal failed");
                    self.stop.raise(StopReason::SessionRenewalFailed);
                    break;
                }
                continue;
            }

            if let Some(reason) = self.stop.reason() {
                info!(%reason, remaining = pending.len(), "stop observed, ending intake");
                break;
            }

            let Some(seed) = pending.pop_front() else {
                break;
            };
            renewed_at_cursor = false;

            let id = match self.resolver.resolve(&seed).await {
                Ok(id) => id,
                Err(cause) => {
                    warn!(symbol = %seed.symbol, exchange = %seed.exchange, error = %cause, "instrument not resolved");
                    not_saved.push(NotSaved::new(seed, NotSavedReason::NotFound));
                    continue;
                }
            };

            let series = match self.fetcher.fetch(id, &seed.symbol).await {
                Ok(series) => series,
                Err(cause) => {
                    warn!(symbol = %seed.symbol, id = %id, error = %cause, "instrument not fetched");
                    not_saved.push(NotSaved::new(seed, NotSavedReason::FetchFailed));
                    continue;
                }
            };

            let instrument = seed.resolved(id).with_series(series);
            if let Err(mpsc::error::SendError(instrument)) = queue.send(instrument).await {
                error!(symbol = %instrument.symbol(), "writer queue closed unexpectedly");
                not_saved.push(NotSaved::new(
                    instrument.into_seed(),
                    NotSavedReason::Discarded,
                ));
                self.stop.raise(StopReason::PersistenceUnavailable);
                break;
            }
        }
    }
}

/// Written count of a finished writer. A writer that died loses whatever was
/// still queued, which is a storage failure rather than a finished run.
fn settle_writer(joined: Result<WriterSummary, JoinError>, stop: &StopSignal) -> Option<usize> {
    match joined {
        Ok(summary) => Some(summary.written),
        Err(cause) => {
            error!(error = %cause, "writer task failed");
            stop.raise(StopReason::PersistenceUnavailable);
            None
        }
    }
}

/// Position of each (symbol, exchange) in the input universe.
struct InputOrder {
    positions: HashMap<(String, String), usize>,
}

impl InputOrder {
    fn of(seeds: &[InstrumentSeed]) -> Self {
        let mut positions = HashMap::with_capacity(seeds.len());
        for (index, seed) in seeds.iter().enumerate() {
            positions
                .entry((seed.symbol.clone(), seed.exchange.clone()))
                .or_insert(index);
        }
        Self { positions }
    }

    /// Stable, so repeated seeds keep the order they were reported in.
    fn sort(&self, not_saved: &mut [NotSaved]) {
        not_saved.sort_by_cached_key(|entry| {
            self.positions
                .get(&(entry.seed.symbol.clone(), entry.seed.exchange.clone()))
                .copied()
                .unwrap_or(usize::MAX)
        });
    }
}
