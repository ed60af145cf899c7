//! Record store contract shared by every persistence backend.
//!
//! # Responsibility
//! - Define the list/find/add capability set callers depend on.
//! - Own the persistence error taxonomy.
//! - Provide id and timestamp assignment rules common to all backends.
//!
//! # Invariants
//! - Next id is always derived from stored data (`max + 1`), never from a
//!   separate counter.
//! - `created_at` never decreases as ids grow.

use crate::db::DbError;
use crate::model::patient::{NewPatient, PatientId, PatientRecord};
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type StoreResult<T> = Result<T, PersistenceError>;

/// Failure to read or write the backing medium.
#[derive(Debug)]
pub enum PersistenceError {
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
    Db(DbError),
    LockTimeout {
        path: PathBuf,
        waited: Duration,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl PersistenceError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "store_io_failed",
            Self::Encode(_) => "store_encode_failed",
            Self::Db(err) => err.code(),
            Self::LockTimeout { .. } => "store_lock_timeout",
            Self::InvalidData(_) => "store_invalid_data",
            Self::UninitializedConnection { .. } => "store_uninitialized",
            Self::MissingRequiredTable(_) | Self::MissingRequiredColumn { .. } => {
                "store_schema_mismatch"
            }
        }
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => write!(f, "failed to {operation} `{}`: {source}", path.display()),
            Self::Encode(err) => write!(f, "failed to encode patient collection: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::LockTimeout { path, waited } => write!(
                f,
                "timed out after {}ms waiting for lock `{}`",
                waited.as_millis(),
                path.display()
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted patient data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "database schema version {actual_version} is not initialized to {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PersistenceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable, concurrency-safe patient collection.
///
/// Implementations must serialize `add` calls against the same medium,
/// including calls made from other processes.
pub trait RecordStore {
    /// Returns every record in insertion order.
    fn list_all(&self) -> StoreResult<Vec<PatientRecord>>;
    /// Returns the record with `id`, or `None` when absent.
    fn find_by_id(&self, id: PatientId) -> StoreResult<Option<PatientRecord>>;
    /// Assigns id and timestamp, persists, and returns the stored record.
    fn add(&self, patient: NewPatient) -> StoreResult<PatientRecord>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn list_all(&self) -> StoreResult<Vec<PatientRecord>> {
        (**self).list_all()
    }

    fn find_by_id(&self, id: PatientId) -> StoreResult<Option<PatientRecord>> {
        (**self).find_by_id(id)
    }

    fn add(&self, patient: NewPatient) -> StoreResult<PatientRecord> {
        (**self).add(patient)
    }
}

/// Computes the id following the current maximum (`1` for an empty store).
pub(crate) fn next_patient_id(current_max: Option<PatientId>) -> StoreResult<PatientId> {
    current_max
        .unwrap_or(0)
        .max(0)
        .checked_add(1)
        .ok_or_else(|| PersistenceError::InvalidData("patient id space exhausted".to_string()))
}

/// Current time, clamped so it never precedes the latest stored record.
pub(crate) fn next_created_at(latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match latest {
        Some(latest) if latest > now => latest,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::{next_created_at, next_patient_id};
    use chrono::{Duration, Utc};

    #[test]
    fn next_id_starts_at_one_and_follows_max() {
        assert_eq!(next_patient_id(None).unwrap(), 1);
        assert_eq!(next_patient_id(Some(41)).unwrap(), 42);
        assert!(next_patient_id(Some(i64::MAX)).is_err());
    }

    #[test]
    fn created_at_never_precedes_latest() {
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(next_created_at(Some(future)), future);

        let past = Utc::now() - Duration::hours(1);
        assert!(next_created_at(Some(past)) > past);
    }
}
