//! CLI argument definitions for barvault.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest` | Resolve, fetch and store the daily history of a symbol universe |
//! | `inspect` | Summarize a store and show the latest bars of a symbol |
//!
//! # Examples
//!
//! ```bash
//! export REFRESH_TOKEN=...
//! barvault ingest --symbols sp500.json --db ./sp500.duckdb
//! barvault inspect --db ./sp500.duckdb --symbol AAPL --limit 5
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "barvault",
    author,
    version,
    about = "Rate-limited daily candlestick ingestion into DuckDB"
)]
pub struct Cli {
    /// Output format for reports.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text for terminals.
    Table,
    /// Single JSON object.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest the trailing daily history of every instrument in a universe file.
    ///
    /// The refresh token is read from REFRESH_TOKEN unless --refresh-token is
    /// given. The rotated token is printed as an `export` line at the start
    /// and end of the run.
    Ingest(IngestArgs),

    /// Show row counts and, optionally, the latest bars of one symbol.
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// JSON array of {symbol, name, industry, subindustry, exchange} objects.
    #[arg(long, default_value = "sp500.json")]
    pub symbols: PathBuf,

    /// DuckDB file to write. Defaults to $BARVAULT_HOME/barvault.duckdb.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Minimum milliseconds between calls to the market source.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Years of daily history to request per instrument.
    #[arg(long, default_value_t = 5)]
    pub lookback_years: u8,

    /// Completed instruments buffered ahead of the writer.
    #[arg(long, default_value_t = 64)]
    pub queue_capacity: usize,

    /// Stop after this many instruments in a row fail to persist.
    #[arg(long)]
    pub max_consecutive_write_failures: Option<u32>,

    /// Log in against the practice environment.
    #[arg(long, default_value_t = false)]
    pub practice: bool,

    /// Refresh token to start from, overriding REFRESH_TOKEN.
    #[arg(long)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// DuckDB file to read. Defaults to $BARVAULT_HOME/barvault.duckdb.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Show the latest bars stored for this symbol.
    #[arg(long)]
    pub symbol: Option<String>,

    /// Number of bars to show per matching instrument.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}
