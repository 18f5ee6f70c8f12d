//! Behavior-driven tests for the ingestion pipeline.
//!
//! These tests drive the orchestrator end to end against a scripted market
//! source and session, writing into throwaway DuckDB files.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use barvault_core::{
    Bar, CandleRequest, InstrumentSeed, MarketSource, NotSavedReason, Orchestrator,
    PipelineConfig, RunOutcome, SessionError, SessionKeeper, SourceError, StopReason, StopSignal,
    SymbolId, SymbolMatch, UtcDateTime, Warehouse, WarehouseConfig,
};

// =============================================================================
// Test doubles
// =============================================================================

/// Shared, ordered log of what the source and session were asked to do.
type EventLog = Arc<Mutex<Vec<(String, Instant)>>>;

struct ScriptedSource {
    listings: Vec<SymbolMatch>,
    series: BTreeMap<SymbolId, Vec<Bar>>,
    events: EventLog,
    interrupt: Option<(String, StopSignal)>,
}

impl ScriptedSource {
    fn new(events: EventLog) -> Self {
        Self {
            listings: Vec::new(),
            series: BTreeMap::new(),
            events,
            interrupt: None,
        }
    }

    fn listing(mut self, symbol: &str, exchange: &str, id: i64, bars: usize) -> Self {
        self.listings
            .push(SymbolMatch::new(symbol, exchange, SymbolId::new(id)));
        self.series.insert(SymbolId::new(id), daily_bars(bars));
        self
    }

    /// Raise `Interrupted` while searching for `symbol`.
    fn interrupt_during(mut self, symbol: &str, stop: StopSignal) -> Self {
        self.interrupt = Some((symbol.to_owned(), stop));
        self
    }

    fn record(&self, event: String) {
        self.events
            .lock()
            .expect("event log")
            .push((event, Instant::now()));
    }
}

impl MarketSource for ScriptedSource {
    fn search_symbols<'a>(
        &'a self,
        prefix: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SymbolMatch>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.record(format!("search:{prefix}"));
            if let Some((symbol, stop)) = &self.interrupt {
                if symbol == prefix {
                    stop.raise(StopReason::Interrupted);
                }
            }
            Ok(self
                .listings
                .iter()
                .filter(|row| row.symbol.starts_with(prefix))
                .cloned()
                .collect())
        })
    }

    fn candles<'a>(
        &'a self,
        req: CandleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            self.record(format!("candles:{}", req.id));
            self.series
                .get(&req.id)
                .cloned()
                .ok_or_else(|| SourceError::unavailable(format!("no candles for {}", req.id)))
        })
    }
}

/// Reports expiry on the polls listed in `expire_on` (1-based).
struct ScriptedSession {
    events: EventLog,
    polls: AtomicUsize,
    expire_on: Vec<usize>,
    renew_fails: bool,
}

impl ScriptedSession {
    fn never_expiring(events: EventLog) -> Self {
        Self {
            events,
            polls: AtomicUsize::new(0),
            expire_on: Vec::new(),
            renew_fails: false,
        }
    }

    fn renewals(&self) -> usize {
        self.events
            .lock()
            .expect("event log")
            .iter()
            .filter(|(event, _)| event == "renew")
            .count()
    }
}

impl SessionKeeper for ScriptedSession {
    fn expiry_notified(&self) -> bool {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.expire_on.contains(&poll)
    }

    fn renew<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>> {
        Box::pin(async move {
            self.events
                .lock()
                .expect("event log")
                .push((String::from("renew"), Instant::now()));
            if self.renew_fails {
                Err(SessionError::Rejected { status: 400 })
            } else {
                Ok(())
            }
        })
    }
}

fn daily_bars(count: usize) -> Vec<Bar> {
    let first = UtcDateTime::parse("2021-10-18T04:00:00Z")
        .expect("ts")
        .into_inner();
    (0..count)
        .map(|day| {
            let start = first + time::Duration::days(day as i64);
            let end = start + time::Duration::days(1);
            let base = 50.0 + day as f64;
            Bar::new(
                UtcDateTime::from_offset_datetime(start).expect("utc"),
                UtcDateTime::from_offset_datetime(end).expect("utc"),
                base,
                base + 0.5,
                base + 1.0,
                base - 1.0,
                10_000 + day as u64,
            )
            .expect("valid bar")
        })
        .collect()
}

fn seed(symbol: &str, exchange: &str) -> InstrumentSeed {
    InstrumentSeed::new(symbol, exchange, format!("{symbol} Inc."), "Sector", "Industry")
        .expect("valid seed")
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        call_interval: Duration::from_millis(2),
        ..PipelineConfig::default()
    }
}

fn events() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn event_names(log: &EventLog) -> Vec<String> {
    log.lock()
        .expect("event log")
        .iter()
        .map(|(event, _)| event.clone())
        .collect()
}

// =============================================================================
// Resolution and persistence
// =============================================================================

#[tokio::test]
async fn when_one_seed_is_unknown_only_that_seed_is_reported_not_saved() {
    // Given: a source that only lists AAPL on NASDAQ with id 1
    let dir = tempfile::tempdir().expect("tempdir");
    let db = WarehouseConfig::at(dir.path().join("bars.duckdb"));
    let log = events();
    let source = ScriptedSource::new(log.clone()).listing("AAPL", "NASDAQ", 1, 5);
    let session = ScriptedSession::never_expiring(log.clone());

    // When: the pipeline runs over AAPL and ZZZZ
    let report = Orchestrator::with_source(Arc::new(source), Arc::new(session), fast_config())
        .run(vec![seed("AAPL", "NASDAQ"), seed("ZZZZ", "NASDAQ")], db.clone())
        .await;

    // Then: AAPL and its bars are stored, ZZZZ is the only unsaved seed
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.saved, 1);
    assert_eq!(report.not_saved_symbols(), vec!["ZZZZ"]);
    assert_eq!(report.not_saved[0].reason, NotSavedReason::NotFound);

    let warehouse = Warehouse::open_read_only(db).expect("reopen");
    let stored = warehouse.instrument(1).expect("query").expect("AAPL row");
    assert_eq!(stored.symbol, "AAPL");
    assert_eq!(stored.exchange, "NASDAQ");
    assert_eq!(warehouse.counts().expect("counts").bars, 5);
}

#[tokio::test]
async fn when_writer_rejects_an_instrument_remaining_instruments_are_still_processed() {
    // Given: two symbols that resolve to the same id, followed by a third
    let dir = tempfile::tempdir().expect("tempdir");
    let db = WarehouseConfig::at(dir.path().join("bars.duckdb"));
    let log = events();
    let source = ScriptedSource::new(log.clone())
        .listing("GOOGL", "NASDAQ", 11135, 4)
        .listing("GOOG", "NASDAQ", 11135, 4)
        .listing("MSFT", "NASDAQ", 27426, 4);
    let session = ScriptedSession::never_expiring(log.clone());

    // When: the pipeline runs
    let report = Orchestrator::with_source(Arc::new(source), Arc::new(session), fast_config())
        .run(
            vec![
                seed("GOOGL", "NASDAQ"),
                seed("GOOG", "NASDAQ"),
                seed("MSFT", "NASDAQ"),
            ],
            db.clone(),
        )
        .await;

    // Then: the duplicate is reported and MSFT is still written
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.saved, 2);
    assert_eq!(report.not_saved_symbols(), vec!["GOOG"]);
    assert_eq!(report.not_saved[0].reason, NotSavedReason::PersistFailed);
    assert!(event_names(&log).contains(&String::from("candles:27426")));

    // And: the rejected instrument left nothing behind
    let counts = Warehouse::open_read_only(db)
        .expect("reopen")
        .counts()
        .expect("counts");
    assert_eq!(counts.instruments, 2);
    assert_eq!(counts.bars, 8);
}

#[tokio::test]
async fn every_persisted_bar_references_a_persisted_instrument() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = WarehouseConfig::at(dir.path().join("bars.duckdb"));
    let log = events();
    let source = ScriptedSource::new(log.clone())
        .listing("MMM", "NYSE", 1, 3)
        .listing("AOS", "NYSE", 2, 0)
        .listing("ABT", "NYSE", 3, 7);
    let session = ScriptedSession::never_expiring(log);

    let report = Orchestrator::with_source(Arc::new(source), Arc::new(session), fast_config())
        .run(
            vec![seed("MMM", "NYSE"), seed("AOS", "NYSE"), seed("ABT", "NYSE")],
            db.clone(),
        )
        .await;
    assert_eq!(report.saved, 3);

    let warehouse = Warehouse::open_read_only(db).expect("reopen");
    let counts = warehouse.counts().expect("counts");
    assert_eq!(counts.instruments, 3);
    assert_eq!(counts.bars, 10);
    assert_eq!(counts.orphan_bars, 0);
    assert!(warehouse.has_candlestick_index().expect("index lookup"));

    // Newest first, straight off the (id, start DESC) index order.
    let latest = warehouse.latest_bars(3, 2).expect("latest");
    assert_eq!(latest.len(), 2);
    assert!(latest[0].start > latest[1].start);
    assert!(latest.iter().all(|bar| bar.low <= bar.open && bar.open <= bar.high));
}

#[tokio::test]
async fn rerunning_against_an_empty_store_yields_identical_row_counts() {
    let mut observed = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = WarehouseConfig::at(dir.path().join("bars.duckdb"));
        let log = events();
        let source = ScriptedSource::new(log.clone())
            .listing("AAPL", "NASDAQ", 1, 6)
            .listing("MSFT", "NASDAQ", 2, 4);
        let session = ScriptedSession::never_expiring(log);

        let report =
            Orchestrator::with_source(Arc::new(source), Arc::new(session), fast_config())
                .run(
                    vec![
                        seed("AAPL", "NASDAQ"),
                        seed("MSFT", "NASDAQ"),
                        seed("ZZZZ", "NASDAQ"),
                    ],
                    db.clone(),
                )
                .await;

        let counts = Warehouse::open_read_only(db)
            .expect("reopen")
            .counts()
            .expect("counts");
        observed.push((report.saved, report.not_saved.len(), counts));
    }

    assert_eq!(observed[0], observed[1]);
}

// =============================================================================
// Session keeping
// =============================================================================

#[tokio::test]
async fn when_session_expires_mid_list_renewal_precedes_the_next_call_and_nothing_is_skipped() {
    // Given: a session that reports expiry on the second poll
    let dir = tempfile::tempdir().expect("tempdir");
    let log = events();
    let source = ScriptedSource::new(log.clone())
        .listing("AAPL", "NASDAQ", 1, 2)
        .listing("MSFT", "NASDAQ", 2, 2)
        .listing("NVDA", "NASDAQ", 3, 2);
    let session = Arc::new(ScriptedSession {
        events: log.clone(),
        polls: AtomicUsize::new(0),
        expire_on: vec![2],
        renew_fails: false,
    });

    // When: the pipeline runs over three seeds
    let report = Orchestrator::with_source(Arc::new(source), session.clone(), fast_config())
        .run(
            vec![
                seed("AAPL", "NASDAQ"),
                seed("MSFT", "NASDAQ"),
                seed("NVDA", "NASDAQ"),
            ],
            WarehouseConfig::at(dir.path().join("bars.duckdb")),
        )
        .await;

    // Then: renew happened once, right before MSFT was resolved
    assert_eq!(session.renewals(), 1);
    assert_eq!(
        event_names(&log),
        vec![
            "search:AAPL",
            "candles:1",
            "renew",
            "search:MSFT",
            "candles:2",
            "search:NVDA",
            "candles:3",
        ]
    );

    // And: every seed was saved
    assert_eq!(report.saved, 3);
    assert!(report.not_saved.is_empty());
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn when_session_renewal_fails_no_further_calls_are_made() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = events();
    let source = ScriptedSource::new(log.clone())
        .listing("AAPL", "NASDAQ", 1, 2)
        .listing("MSFT", "NASDAQ", 2, 2);
    let session = Arc::new(ScriptedSession {
        events: log.clone(),
        polls: AtomicUsize::new(0),
        expire_on: vec![2],
        renew_fails: true,
    });

    let report = Orchestrator::with_source(Arc::new(source), session, fast_config())
        .run(
            vec![
                seed("AAPL", "NASDAQ"),
                seed("MSFT", "NASDAQ"),
                seed("NVDA", "NASDAQ"),
            ],
            WarehouseConfig::at(dir.path().join("bars.duckdb")),
        )
        .await;

    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: StopReason::SessionRenewalFailed
        }
    );
    assert_eq!(report.saved, 1);
    assert_eq!(report.not_saved_symbols(), vec!["MSFT", "NVDA"]);
    assert_eq!(report.count(NotSavedReason::Skipped), 2);
    assert_eq!(
        event_names(&log),
        vec!["search:AAPL", "candles:1", "renew"]
    );
}

// =============================================================================
// Stop signal
// =============================================================================

#[tokio::test]
async fn when_store_cannot_be_opened_the_run_stops_before_any_source_call() {
    // Given: a database path whose parent is a regular file
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("write blocker");
    let log = events();
    let source = ScriptedSource::new(log.clone())
        .listing("AAPL", "NASDAQ", 1, 2)
        .listing("MSFT", "NASDAQ", 2, 2)
        .listing("NVDA", "NASDAQ", 3, 2);
    let session = ScriptedSession::never_expiring(log.clone());
    let config = PipelineConfig {
        call_interval: Duration::from_millis(20),
        ..PipelineConfig::default()
    };

    // When: the pipeline runs
    let report = Orchestrator::with_source(Arc::new(source), Arc::new(session), config)
        .run(
            vec![
                seed("AAPL", "NASDAQ"),
                seed("MSFT", "NASDAQ"),
                seed("NVDA", "NASDAQ"),
            ],
            WarehouseConfig::at(blocker.join("bars.duckdb")),
        )
        .await;

    // Then: the source is never called and every seed is skipped in order
    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: StopReason::PersistenceUnavailable
        }
    );
    assert_eq!(report.saved, 0);
    assert!(event_names(&log).is_empty());
    assert_eq!(report.not_saved_symbols(), vec!["AAPL", "MSFT", "NVDA"]);
    assert_eq!(report.count(NotSavedReason::Skipped), 3);
}

#[tokio::test]
async fn when_interrupted_the_in_flight_instrument_completes_and_the_rest_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = WarehouseConfig::at(dir.path().join("bars.duckdb"));
    let log = events();
    let session = ScriptedSession::never_expiring(log.clone());

    // The source is built before the orchestrator, so it raises a local
    // signal that is forwarded to the orchestrator's.
    let placeholder = StopSignal::new();
    let source = ScriptedSource::new(log.clone())
        .listing("AAPL", "NASDAQ", 1, 2)
        .listing("MSFT", "NASDAQ", 2, 2)
        .listing("NVDA", "NASDAQ", 3, 2)
        .interrupt_during("MSFT", placeholder.clone());
    let orchestrator =
        Orchestrator::with_source(Arc::new(source), Arc::new(session), fast_config());
    let stop = orchestrator.stop_signal();
    let forward = tokio::spawn(async move {
        let reason = placeholder.wait().await;
        stop.raise(reason);
    });

    let report = orchestrator
        .run(
            vec![
                seed("AAPL", "NASDAQ"),
                seed("MSFT", "NASDAQ"),
                seed("NVDA", "NASDAQ"),
                seed("AMZN", "NASDAQ"),
            ],
            db,
        )
        .await;
    forward.await.expect("forwarder");

    assert_eq!(
        report.outcome,
        RunOutcome::Aborted {
            reason: StopReason::Interrupted
        }
    );
    assert!(report.saved >= 1);
    assert!(!event_names(&log).contains(&String::from("search:AMZN")));
    assert!(report
        .not_saved
        .iter()
        .any(|entry| entry.seed.symbol == "AMZN" && entry.reason == NotSavedReason::Skipped));
}

// =============================================================================
// Rate gate
// =============================================================================

#[tokio::test]
async fn resolver_and_fetcher_calls_share_one_spacing_schedule() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = events();
    let source = ScriptedSource::new(log.clone())
        .listing("AAPL", "NASDAQ", 1, 1)
        .listing("MSFT", "NASDAQ", 2, 1)
        .listing("NVDA", "NASDAQ", 3, 1);
    let session = ScriptedSession::never_expiring(log.clone());
    let interval = Duration::from_millis(25);
    let config = PipelineConfig {
        call_interval: interval,
        ..PipelineConfig::default()
    };

    let report = Orchestrator::with_source(Arc::new(source), Arc::new(session), config)
        .run(
            vec![
                seed("AAPL", "NASDAQ"),
                seed("MSFT", "NASDAQ"),
                seed("NVDA", "NASDAQ"),
            ],
            WarehouseConfig::at(dir.path().join("bars.duckdb")),
        )
        .await;
    assert_eq!(report.saved, 3);

    let stamps: Vec<Instant> = log
        .lock()
        .expect("event log")
        .iter()
        .map(|(_, at)| *at)
        .collect();
    assert_eq!(stamps.len(), 6);

    let total = stamps[stamps.len() - 1].duration_since(stamps[0]);
    let slack = Duration::from_millis(5) * (stamps.len() as u32);
    assert!(
        total + slack >= interval * (stamps.len() as u32 - 1),
        "6 calls spanned {total:?}"
    );
}
