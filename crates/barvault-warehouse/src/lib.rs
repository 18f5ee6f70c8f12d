//! # Barvault Warehouse
//!
//! DuckDB-backed store for resolved instruments and their daily candlesticks.
//!
//! ## Overview
//!
//! A [`Warehouse`] owns exactly one DuckDB connection. The ingestion pipeline
//! hands it to a single writer task, which is the only code allowed to mutate
//! the store. Each instrument is written in one transaction: the `symbolids`
//! row first, then every `candlestick` row that references it.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `symbolids` | One row per resolved instrument, keyed by the source's id |
//! | `candlestick` | Daily bars, `id` references `symbolids(id)` |
//! | `schema_migrations` | Applied migration versions |
//!
//! The `candlestick` table carries a composite index on
//! `(id ASC, start DESC, "end" DESC)` so "latest N bars for an instrument"
//! scans walk the index instead of sorting.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use barvault_warehouse::{BarRecord, InstrumentRecord, Warehouse, WarehouseConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open(WarehouseConfig::default())?;
//!     warehouse.prepare_statements()?;
//!
//!     let instrument = InstrumentRecord {
//!         id: 8049,
//!         symbol: "AAPL".to_string(),
//!         exchange: "NASDAQ".to_string(),
//!         name: "Apple Inc.".to_string(),
//!         industry: "Information Technology".to_string(),
//!         subindustry: "Technology Hardware".to_string(),
//!     };
//!     let bars = vec![BarRecord {
//!         id: 8049,
//!         start: "2024-01-02 05:00:00".to_string(),
//!         end: "2024-01-03 05:00:00".to_string(),
//!         open: 187.15,
//!         close: 185.64,
//!         high: 188.44,
//!         low: 183.89,
//!         volume: 82_488_700,
//!     }];
//!     warehouse.store_instrument(&instrument, &bars)?;
//!     Ok(())
//! }
//! ```

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub use duckdb::AccessMode;
pub use migrations::CANDLESTICK_INDEX;

const INSERT_INSTRUMENT_SQL: &str = "INSERT INTO symbolids \
     (id, symbol, exchange, name, industry, subindustry) \
     VALUES (?, ?, ?, ?, ?, ?)";

const INSERT_BAR_SQL: &str = "INSERT INTO candlestick \
     (id, start, \"end\", open, close, high, low, volume) \
     VALUES (?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?)";

const SELECT_BAR_COLUMNS: &str = "id, CAST(start AS VARCHAR), CAST(\"end\" AS VARCHAR), \
     open, close, high, low, volume";

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (creating the database directory).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A record could not be written as given.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_barvault_home().join("barvault.duckdb"),
        }
    }
}

impl WarehouseConfig {
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// A `symbolids` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentRecord {
    /// Source-assigned internal identifier.
    pub id: i64,
    pub symbol: String,
    pub exchange: String,
    pub name: String,
    pub industry: String,
    pub subindustry: String,
}

/// A `candlestick` row.
///
/// Timestamps are UTC, formatted `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarRecord {
    pub id: i64,
    pub start: String,
    pub end: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
}

/// Row counts used for end-of-run reporting and integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub instruments: i64,
    pub bars: i64,
    /// Candlestick rows whose `id` has no `symbolids` row. Always zero for a
    /// store written by the pipeline.
    pub orphan_bars: i64,
}

/// Single-connection handle to the instrument/candlestick store.
pub struct Warehouse {
    db_path: Option<PathBuf>,
    connection: Connection,
}

impl Warehouse {
    /// Open (creating if needed) the store read-write and apply migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let connection = duckdb::open_connection(&config.db_path, AccessMode::ReadWrite)?;
        let warehouse = Self {
            db_path: Some(config.db_path),
            connection,
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Open an existing store without write access.
    pub fn open_read_only(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        let connection = duckdb::open_connection(&config.db_path, AccessMode::ReadOnly)?;
        Ok(Self {
            db_path: Some(config.db_path),
            connection,
        })
    }

    /// Open a throwaway in-memory store with the schema applied.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let warehouse = Self {
            db_path: None,
            connection: duckdb::open_in_memory()?,
        };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Create the schema if it does not exist yet.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        migrations::apply_migrations(&self.connection)?;
        Ok(())
    }

    /// Prepare the instrument and candlestick insert statements.
    ///
    /// Statements live in the connection's statement cache and are reused by
    /// every [`store_instrument`](Self::store_instrument) call. Failing here
    /// means the store is unusable.
    pub fn prepare_statements(&self) -> Result<(), WarehouseError> {
        self.connection.prepare_cached(INSERT_INSTRUMENT_SQL)?;
        self.connection.prepare_cached(INSERT_BAR_SQL)?;
        Ok(())
    }

    /// Path of the database file, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Write one instrument and all of its bars in a single transaction.
    ///
    /// The instrument row is inserted before any bar so the foreign key on
    /// `candlestick.id` always resolves. On any error the transaction is
    /// rolled back and nothing of this instrument is visible.
    pub fn store_instrument(
        &self,
        instrument: &InstrumentRecord,
        bars: &[BarRecord],
    ) -> Result<(), WarehouseError> {
        if let Some(bar) = bars.iter().find(|bar| bar.id != instrument.id) {
            return Err(WarehouseError::InvalidData(format!(
                "bar references id {} but instrument id is {}",
                bar.id, instrument.id
            )));
        }

        self.connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            let mut insert_instrument = self.connection.prepare_cached(INSERT_INSTRUMENT_SQL)?;
            let params: [&dyn ToSql; 6] = [
                &instrument.id,
                &instrument.symbol,
                &instrument.exchange,
                &instrument.name,
                &instrument.industry,
                &instrument.subindustry,
            ];
            insert_instrument.execute(params.as_slice())?;

            let mut insert_bar = self.connection.prepare_cached(INSERT_BAR_SQL)?;
            for bar in bars {
                let params: [&dyn ToSql; 8] = [
                    &bar.id,
                    &bar.start,
                    &bar.end,
                    &bar.open,
                    &bar.close,
                    &bar.high,
                    &bar.low,
                    &bar.volume,
                ];
                insert_bar.execute(params.as_slice())?;
            }

            Ok(())
        })();

        finalize_transaction(&self.connection, result)
    }

    /// Instrument, bar and orphan-bar counts.
    pub fn counts(&self) -> Result<StoreCounts, WarehouseError> {
        let instruments: i64 =
            self.connection
                .query_row("SELECT COUNT(*) FROM symbolids", [], |row| row.get(0))?;
        let bars: i64 =
            self.connection
                .query_row("SELECT COUNT(*) FROM candlestick", [], |row| row.get(0))?;
        let orphan_bars: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM candlestick c \
             LEFT JOIN symbolids s ON s.id = c.id \
             WHERE s.id IS NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreCounts {
            instruments,
            bars,
            orphan_bars,
        })
    }

    /// Look up an instrument row by its internal id.
    pub fn instrument(&self, id: i64) -> Result<Option<InstrumentRecord>, WarehouseError> {
        let mut statement = self.connection.prepare(
            "SELECT id, symbol, exchange, name, industry, subindustry \
             FROM symbolids WHERE id = ?",
        )?;
        let params: [&dyn ToSql; 1] = [&id];
        let mut rows = statement.query_map(params.as_slice(), read_instrument)?;
        Ok(rows.next().transpose()?)
    }

    /// All instrument rows carrying `symbol`, ordered by id.
    pub fn instruments_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Vec<InstrumentRecord>, WarehouseError> {
        let mut statement = self.connection.prepare(
            "SELECT id, symbol, exchange, name, industry, subindustry \
             FROM symbolids WHERE symbol = ? ORDER BY id",
        )?;
        let params: [&dyn ToSql; 1] = [&symbol];
        let rows = statement
            .query_map(params.as_slice(), read_instrument)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The most recent `limit` bars of one instrument, newest first.
    pub fn latest_bars(&self, id: i64, limit: usize) -> Result<Vec<BarRecord>, WarehouseError> {
        let limit = i64::try_from(limit)
            .map_err(|_| WarehouseError::InvalidData(format!("limit {limit} is too large")))?;
        let sql = format!(
            "SELECT {SELECT_BAR_COLUMNS} FROM candlestick \
             WHERE id = ? ORDER BY start DESC, \"end\" DESC LIMIT ?"
        );
        let mut statement = self.connection.prepare(&sql)?;
        let params: [&dyn ToSql; 2] = [&id, &limit];
        let rows = statement
            .query_map(params.as_slice(), read_bar)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Whether the composite candlestick index is present.
    pub fn has_candlestick_index(&self) -> Result<bool, WarehouseError> {
        let params: [&dyn ToSql; 1] = [&CANDLESTICK_INDEX];
        let count: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM duckdb_indexes() WHERE index_name = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => match connection.execute_batch("COMMIT") {
            Ok(()) => Ok(value),
            Err(error) => {
                rollback(connection);
                Err(error.into())
            }
        },
        Err(error) => {
            rollback(connection);
            Err(error)
        }
    }
}

fn rollback(connection: &Connection) {
    if let Err(error) = connection.execute_batch("ROLLBACK") {
        warn!(%error, "rollback failed");
    }
}

fn read_instrument(row: &::duckdb::Row<'_>) -> Result<InstrumentRecord, ::duckdb::Error> {
    Ok(InstrumentRecord {
        id: row.get(0)?,
        symbol: row.get(1)?,
        exchange: row.get(2)?,
        name: row.get(3)?,
        industry: row.get(4)?,
        subindustry: row.get(5)?,
    })
}

fn read_bar(row: &::duckdb::Row<'_>) -> Result<BarRecord, ::duckdb::Error> {
    Ok(BarRecord {
        id: row.get(0)?,
        start: row.get(1)?,
        end: row.get(2)?,
        open: row.get(3)?,
        close: row.get(4)?,
        high: row.get(5)?,
        low: row.get(6)?,
        volume: row.get(7)?,
    })
}

/// Resolve the barvault home directory from environment or default.
fn resolve_barvault_home() -> PathBuf {
    if let Some(path) = env::var_os("BARVAULT_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".barvault");
    }

    PathBuf::from(".barvault")
}
