//! `DuckDB` connection setup.

use std::path::Path;

use ::duckdb::{Config, Connection};

/// Access mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access, used for inspection after a run.
    ReadOnly,
    /// Read-write access, reserved for the single writer.
    ReadWrite,
}

/// Open a new database connection.
///
/// # Errors
/// Returns an error if the database file cannot be opened or configured.
pub fn open_connection(path: &Path, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = match mode {
        AccessMode::ReadWrite => Connection::open(path)?,
        AccessMode::ReadOnly => Connection::open_with_flags(
            path,
            Config::default().access_mode(::duckdb::AccessMode::ReadOnly)?,
        )?,
    };
    configure_connection(&connection)?;
    Ok(connection)
}

/// Open an in-memory database, used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open_in_memory()?;
    configure_connection(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(())
}
