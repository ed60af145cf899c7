//! Core domain logic for patient records.
//! This crate is the single source of truth for validation and storage
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, StoreBackend, StoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::patient::{parse_patient_id, InvalidPatientId, NewPatient, PatientId, PatientRecord};
pub use model::validation::{
    is_valid_email, normalize_and_validate, PatientValidationError, RawPatientInput,
    ValidationIssue, MAX_PATIENT_AGE, MIN_PATIENT_AGE,
};
pub use repo::{
    open_record_store, DynRecordStore, JsonFileStore, PersistenceError, RecordStore,
    SqliteRecordStore, StoreResult,
};
pub use service::patient_service::{
    parse_patient_payload, AddPatientError, PatientService, PayloadError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
