//! Market source contract.
//!
//! The pipeline needs exactly two things from an upstream provider:
//!
//! | Method | Request | Response |
//! |--------|---------|----------|
//! | [`search_symbols`](MarketSource::search_symbols) | symbol prefix | [`SymbolMatch`] candidates |
//! | [`candles`](MarketSource::candles) | [`CandleRequest`] | daily [`Bar`]s, oldest first |
//!
//! Neither method throttles itself. Callers go through a
//! [`RateGate`](crate::RateGate) before every call.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Bar, SymbolId, UtcDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Unauthorized,
    Internal,
}

/// Structured adapter error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::InvalidRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::Unauthorized, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(SourceErrorKind::Internal, message)
    }

    fn with_kind(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Unauthorized => "source.unauthorized",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// One candidate returned by a symbol search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatch {
    pub symbol: String,
    pub listing_exchange: String,
    pub id: SymbolId,
}

impl SymbolMatch {
    pub fn new(
        symbol: impl Into<String>,
        listing_exchange: impl Into<String>,
        id: SymbolId,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            listing_exchange: listing_exchange.into(),
            id,
        }
    }
}

/// Daily candles for one instrument over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleRequest {
    pub id: SymbolId,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl CandleRequest {
    pub fn new(id: SymbolId, start: UtcDateTime, end: UtcDateTime) -> Result<Self, SourceError> {
        if start >= end {
            return Err(SourceError::invalid_request(format!(
                "candle window start {start} must be before end {end}"
            )));
        }
        Ok(Self { id, start, end })
    }
}

pub trait MarketSource: Send + Sync {
    /// Candidates whose symbol starts with `prefix`, in the provider's order.
    fn search_symbols<'a>(
        &'a self,
        prefix: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SymbolMatch>, SourceError>> + Send + 'a>>;

    fn candles<'a>(
        &'a self,
        req: CandleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Bar>, SourceError>> + Send + 'a>>;
}
