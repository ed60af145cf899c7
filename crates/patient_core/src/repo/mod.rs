//! Record store abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contract shared by every backend.
//! - Isolate file locking and SQL details from service orchestration.
//!
//! # Invariants
//! - Stores only accept `NewPatient` values, which exist only after
//!   validation.
//! - Store APIs report absence as `None`, and transport failures as
//!   `PersistenceError`.

mod json_store;
mod lock;
mod sqlite_store;
pub mod store;

pub use json_store::JsonFileStore;
pub use sqlite_store::SqliteRecordStore;
pub use store::{PersistenceError, RecordStore, StoreResult};

use crate::config::{StoreBackend, StoreConfig};
use crate::db::DEFAULT_BUSY_TIMEOUT;
use log::info;

/// Boxed store handle selected at runtime.
pub type DynRecordStore = Box<dyn RecordStore + Send>;

/// Opens the backend described by `config`.
///
/// Called once at process start; the returned handle is passed to every
/// operation.
pub fn open_record_store(config: &StoreConfig) -> StoreResult<DynRecordStore> {
    info!(
        "event=store_open module=repo status=start backend={}",
        config.backend.as_str()
    );

    let store: DynRecordStore = match config.backend {
        StoreBackend::Json => {
            let store = JsonFileStore::open(config.path.clone())?;
            match config.lock_timeout {
                Some(timeout) => Box::new(store.with_lock_timeout(timeout)),
                None => Box::new(store),
            }
        }
        StoreBackend::Sqlite => Box::new(SqliteRecordStore::open(
            &config.path,
            config.lock_timeout.unwrap_or(DEFAULT_BUSY_TIMEOUT),
        )?),
    };

    info!(
        "event=store_open module=repo status=ok backend={}",
        config.backend.as_str()
    );
    Ok(store)
}
