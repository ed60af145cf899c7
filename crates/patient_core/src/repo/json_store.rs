//! JSON document record store.
//!
//! # Responsibility
//! - Persist the whole patient collection as one `{"patients": [...]}`
//!   document.
//! - Serialize writers across threads and processes with an advisory lock.
//!
//! # Invariants
//! - `add` holds the exclusive lock for its full read-modify-write cycle.
//! - Reads hold the shared lock, so they never observe a half-written file.
//! - Documents are replaced by temp-file rename, never written in place.
//! - A missing, blank or unparsable document, or one whose root is not a
//!   `patients` array, reads as an empty collection.
//! - Records inside a well-formed collection are decoded one by one. A bad
//!   record is an error, never a reason to treat the store as empty.

use crate::model::patient::{NewPatient, PatientId, PatientRecord};
use crate::repo::lock::{LockMode, StoreLock};
use crate::repo::store::{
    next_created_at, next_patient_id, PersistenceError, RecordStore, StoreResult,
};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// On-disk document shape.
#[derive(Debug, Default, Serialize)]
struct PatientDocument {
    patients: Vec<PatientRecord>,
}

/// Record store backed by a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Option<Duration>,
}

impl JsonFileStore {
    /// Prepares a store at `path`, creating its parent directory.
    ///
    /// The document itself is created lazily on the first `add`.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| PersistenceError::io("create store directory", parent, source))?;
        }

        let lock_path = sidecar_path(&path, "lock");
        Ok(Self {
            path,
            lock_path,
            lock_timeout: None,
        })
    }

    /// Bounds how long operations wait for the store lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, mode: LockMode) -> StoreResult<StoreLock> {
        StoreLock::acquire(&self.lock_path, mode, self.lock_timeout)
    }

    fn load_document(&self) -> StoreResult<PatientDocument> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PatientDocument::default()),
            Err(source) => return Err(PersistenceError::io("read store", &self.path, source)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(PatientDocument::default());
        }

        let entries = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(mut root)) => match root.remove("patients") {
                None => return Ok(PatientDocument::default()),
                Some(Value::Array(entries)) => entries,
                Some(_) => return Ok(recovered_document("`patients` is not an array")),
            },
            Ok(_) => return Ok(recovered_document("document root is not an object")),
            Err(err) => return Ok(recovered_document(err)),
        };

        let patients = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value::<PatientRecord>(entry).map_err(|err| {
                    PersistenceError::InvalidData(format!(
                        "patient entry {index} in {}: {err}",
                        self.path.display()
                    ))
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(PatientDocument { patients })
    }

    fn write_document(&self, document: &PatientDocument) -> StoreResult<()> {
        let payload = serde_json::to_vec_pretty(document).map_err(PersistenceError::Encode)?;
        let temp_path = sidecar_path(&self.path, &format!("{}.tmp", Uuid::new_v4().simple()));

        let result = write_synced(&temp_path, &payload).and_then(|()| {
            fs::rename(&temp_path, &self.path)
                .map_err(|source| PersistenceError::io("replace store", &self.path, source))
        });
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }

        // Best effort: persist the rename itself.
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    fn add_locked(&self, patient: NewPatient) -> StoreResult<PatientRecord> {
        let _guard = self.lock(LockMode::Exclusive)?;
        let mut document = self.load_document()?;

        let current_max = document.patients.iter().map(|record| record.id).max();
        let latest_created_at = document.patients.iter().map(|record| record.created_at).max();
        let record = patient.into_record(
            next_patient_id(current_max)?,
            next_created_at(latest_created_at),
        );

        document.patients.push(record.clone());
        self.write_document(&document)?;
        Ok(record)
    }
}

impl RecordStore for JsonFileStore {
    fn list_all(&self) -> StoreResult<Vec<PatientRecord>> {
        let _guard = self.lock(LockMode::Shared)?;
        Ok(self.load_document()?.patients)
    }

    fn find_by_id(&self, id: PatientId) -> StoreResult<Option<PatientRecord>> {
        let _guard = self.lock(LockMode::Shared)?;
        Ok(self
            .load_document()?
            .patients
            .into_iter()
            .find(|record| record.id == id))
    }

    fn add(&self, patient: NewPatient) -> StoreResult<PatientRecord> {
        let started_at = Instant::now();
        match self.add_locked(patient) {
            Ok(record) => {
                info!(
                    "event=patient_add module=repo backend=json status=ok id={} duration_ms={}",
                    record.id,
                    started_at.elapsed().as_millis()
                );
                Ok(record)
            }
            Err(err) => {
                error!(
                    "event=patient_add module=repo backend=json status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn recovered_document(reason: impl Display) -> PatientDocument {
    warn!(
        "event=store_load module=repo backend=json status=recovered error_code=store_document_corrupt error={}",
        reason
    );
    PatientDocument::default()
}

/// `<dir>/patients.json` + `lock` -> `<dir>/patients.json.lock`.
fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn write_synced(path: &Path, payload: &[u8]) -> StoreResult<()> {
    let mut file =
        File::create(path).map_err(|source| PersistenceError::io("create temp file", path, source))?;
    file.write_all(payload)
        .and_then(|()| file.sync_all())
        .map_err(|source| PersistenceError::io("write temp file", path, source))
}

#[cfg(test)]
mod tests {
    use super::sidecar_path;
    use std::path::Path;

    #[test]
    fn sidecar_path_appends_suffix_to_file_name() {
        assert_eq!(
            sidecar_path(Path::new("/data/patients.json"), "lock"),
            Path::new("/data/patients.json.lock")
        );
        assert_eq!(
            sidecar_path(Path::new("patients.json"), "abc.tmp"),
            Path::new("patients.json.abc.tmp")
        );
    }
}
