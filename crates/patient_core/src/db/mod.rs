//! SQLite backing for the SQL record store.
//!
//! # Responsibility
//! - Hand out connections that are migrated and configured to wait on
//!   competing writers.
//! - Tell apart connection failures, failed schema steps and databases
//!   written by a newer build.
//!
//! # Invariants
//! - `PRAGMA user_version` is the only record of the applied schema.
//! - A failed schema step leaves `user_version` where it was.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_db_with_busy_timeout, DEFAULT_BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating a patient database.
#[derive(Debug)]
pub enum DbError {
    /// Opening, configuring or querying the connection failed.
    Sqlite(rusqlite::Error),
    /// Schema step `version` could not be applied.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file was migrated by a build that knows more schema steps.
    SchemaTooNew { found: u32, supported: u32 },
}

impl DbError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "db_sqlite_failed",
            Self::Migration { .. } => "db_migration_failed",
            Self::SchemaTooNew { .. } => "db_schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Migration { version, source } => {
                write!(f, "schema migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "patient database is at schema {found}, this build supports up to {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
