//! SQLite-backed record store.
//!
//! # Responsibility
//! - Persist patients in the `patients` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `add` runs inside an IMMEDIATE transaction, so competing writers are
//!   serialized by SQLite's reserved lock.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `created_at` is stored as RFC 3339 UTC text.

use crate::db::migrations::latest_version;
use crate::db::{open_db_in_memory, open_db_with_busy_timeout};
use crate::model::patient::{NewPatient, PatientId, PatientRecord};
use crate::repo::store::{
    next_created_at, next_patient_id, PersistenceError, RecordStore, StoreResult,
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::{Duration, Instant};

const PATIENT_SELECT_SQL: &str = "SELECT
    id,
    name,
    age,
    email,
    \"condition\",
    created_at
FROM patients";

const REQUIRED_COLUMNS: &[&str] = &["id", "name", "age", "email", "condition", "created_at"];

/// Record store over a migrated SQLite connection.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Opens (creating and migrating when needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = open_db_with_busy_timeout(path, busy_timeout)?;
        Self::try_new(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Wraps an existing connection after checking its schema.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    /// Underlying connection, for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn add_in_transaction(&self, patient: NewPatient) -> StoreResult<PatientRecord> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let current_max: Option<PatientId> =
            tx.query_row("SELECT MAX(id) FROM patients;", [], |row| row.get(0))?;
        let latest_created_at = tx
            .query_row(
                "SELECT created_at FROM patients ORDER BY id DESC LIMIT 1;",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|text| parse_timestamp(&text))
            .transpose()?;

        let record = patient.into_record(
            next_patient_id(current_max)?,
            next_created_at(latest_created_at),
        );

        tx.execute(
            "INSERT INTO patients (
                id,
                name,
                age,
                email,
                \"condition\",
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.id,
                record.name.as_str(),
                record.age,
                record.email.as_str(),
                record.condition.as_str(),
                format_timestamp(record.created_at),
            ],
        )?;
        tx.commit()?;

        Ok(record)
    }
}

impl RecordStore for SqliteRecordStore {
    fn list_all(&self) -> StoreResult<Vec<PatientRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PATIENT_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut patients = Vec::new();

        while let Some(row) = rows.next()? {
            patients.push(parse_patient_row(row)?);
        }

        Ok(patients)
    }

    fn find_by_id(&self, id: PatientId) -> StoreResult<Option<PatientRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PATIENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_patient_row(row)?));
        }

        Ok(None)
    }

    fn add(&self, patient: NewPatient) -> StoreResult<PatientRecord> {
        let started_at = Instant::now();
        match self.add_in_transaction(patient) {
            Ok(record) => {
                info!(
                    "event=patient_add module=repo backend=sqlite status=ok id={} duration_ms={}",
                    record.id,
                    started_at.elapsed().as_millis()
                );
                Ok(record)
            }
            Err(err) => {
                error!(
                    "event=patient_add module=repo backend=sqlite status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn parse_patient_row(row: &Row<'_>) -> StoreResult<PatientRecord> {
    let id: PatientId = row.get("id")?;
    if id <= 0 {
        return Err(PersistenceError::InvalidData(format!(
            "invalid id value `{id}` in patients.id"
        )));
    }

    let created_at_text: String = row.get("created_at")?;
    Ok(PatientRecord {
        id,
        name: row.get("name")?,
        age: row.get("age")?,
        email: row.get("email")?,
        condition: row.get("condition")?,
        created_at: parse_timestamp(&created_at_text)?,
    })
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| {
            PersistenceError::InvalidData(format!(
                "invalid timestamp `{value}` in patients.created_at"
            ))
        })
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 =
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version < expected_version {
        return Err(PersistenceError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "patients")? {
        return Err(PersistenceError::MissingRequiredTable("patients"));
    }

    for &column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "patients", column)? {
            return Err(PersistenceError::MissingRequiredColumn {
                table: "patients",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
