//! Versioned schema migrations for the instrument/candlestick store.

use ::duckdb::{Connection, ToSql};
use tracing::debug;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_symbolids_candlestick",
        sql: r#"
CREATE TABLE IF NOT EXISTS symbolids (
    id BIGINT PRIMARY KEY,
    symbol TEXT NOT NULL,
    exchange TEXT NOT NULL,
    name TEXT NOT NULL,
    industry TEXT NOT NULL,
    subindustry TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS candlestick (
    id BIGINT NOT NULL REFERENCES symbolids(id),
    start TIMESTAMP NOT NULL,
    "end" TIMESTAMP NOT NULL,
    open DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    volume BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_candlestick_index",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_candlestick_id_start_end
    ON candlestick (id ASC, start DESC, "end" DESC);
"#,
    },
];

/// Name of the composite (id, start, end) index on `candlestick`.
pub const CANDLESTICK_INDEX: &str = "idx_candlestick_id_start_end";

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Safe to call on every startup.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let params: [&dyn ToSql; 1] = [&migration.version];
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            debug!(version = migration.version, "applying migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params.as_slice(),
            )?;
        }
    }

    Ok(())
}
