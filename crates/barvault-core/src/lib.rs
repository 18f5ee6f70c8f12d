//! # Barvault Core
//!
//! Rate-limited, cancellable ingestion of daily candlesticks for a fixed
//! universe of instruments.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Questrade market source |
//! | [`domain`] | Seeds, resolved instruments, bars, UTC timestamps |
//! | [`error`] | Validation, core and per-instrument error types |
//! | [`fetcher`] | Gated candle retrieval over the lookback window |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`pipeline`] | Orchestrator, writer and failure sink |
//! | [`rate_gate`] | Pipeline-wide call throttle |
//! | [`resolver`] | Gated (symbol, exchange) to id resolution |
//! | [`seeds`] | Universe loading |
//! | [`session`] | Credential expiry and renewal |
//! | [`signal`] | Close-once stop signal |
//! | [`source`] | Market source contract |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use barvault_core::{
//!     load_universe, Orchestrator, PipelineConfig, QuestradeAdapter, QuestradeSession,
//!     ReqwestHttpClient, SessionConfig, WarehouseConfig,
//! };
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let session = Arc::new(QuestradeSession::login(http.clone(), SessionConfig::new(token)).await?);
//! let source = Arc::new(QuestradeAdapter::new(http, session.clone()));
//!
//! let report = Orchestrator::with_source(source, session, PipelineConfig::default())
//!     .run(load_universe("sp500.json")?, WarehouseConfig::default())
//!     .await;
//! println!("saved {}, not saved {}", report.saved, report.not_saved.len());
//! ```
//!
//! ## Error Handling
//!
//! Instrument-scoped failures ([`IngestError`], [`WriteFailure::Rejected`])
//! never end a run. They surface in [`IngestReport::not_saved`]. A run ends
//! early only through the [`StopSignal`]:
//!
//! ```rust
//! use barvault_core::{RunOutcome, StopReason};
//!
//! fn describe(outcome: RunOutcome) -> &'static str {
//!     match outcome {
//!         RunOutcome::Completed => "all seeds processed",
//!         RunOutcome::Aborted { reason: StopReason::SessionRenewalFailed } => "credentials lost",
//!         RunOutcome::Aborted { .. } => "stopped early",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! Access and refresh tokens are never logged and are redacted from `Debug`
//! output.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod pipeline;
pub mod rate_gate;
pub mod resolver;
pub mod seeds;
pub mod session;
pub mod signal;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::QuestradeAdapter;

pub use domain::{Bar, Instrument, InstrumentSeed, ResolvedInstrument, SymbolId, UtcDateTime};

pub use error::{CoreError, IngestError, ValidationError};

pub use fetcher::Fetcher;
pub use rate_gate::RateGate;
pub use resolver::Resolver;

pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

pub use pipeline::{
    FailurePolicy, FailureSink, IngestReport, NotSaved, NotSavedReason, Orchestrator,
    PipelineConfig, RunOutcome, WriteFailure, Writer, WriterSummary,
};

pub use seeds::{load_universe, parse_universe};

pub use session::{QuestradeSession, SessionConfig, SessionError, SessionKeeper};

pub use signal::{StopReason, StopSignal};

pub use source::{CandleRequest, MarketSource, SourceError, SourceErrorKind, SymbolMatch};

// Warehouse (re-exported from barvault-warehouse)
pub use barvault_warehouse::{
    BarRecord, InstrumentRecord, StoreCounts, Warehouse, WarehouseConfig, WarehouseError,
};
