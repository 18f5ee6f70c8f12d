use thiserror::Error;

use crate::source::SourceError;

/// Validation and contract errors exposed by `barvault-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("seed field '{field}' cannot be empty")]
    EmptySeedField { field: &'static str },

    #[error("timestamp must be RFC3339: '{value}'")]
    InvalidTimestamp { value: String },
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("bar start must be before its end")]
    InvalidBarSpan,
    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,
    #[error("bar volume {volume} does not fit the store's integer column")]
    VolumeOutOfRange { volume: u64 },

    #[error("pipeline setting '{field}' must be greater than zero")]
    ZeroSetting { field: &'static str },
}

/// Top-level error type for core operations outside the pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Instrument-scoped pipeline errors. None of these end a run on their own.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no exact match for {symbol} on {exchange}")]
    NotFound {
        symbol: String,
        exchange: String,
        #[source]
        lookup: Option<SourceError>,
    },

    #[error("failed to fetch bars for {symbol}: {source}")]
    FetchFailed {
        symbol: String,
        #[source]
        source: SourceError,
    },
}
