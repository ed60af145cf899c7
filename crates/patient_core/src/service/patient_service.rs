//! Patient use-case service.
//!
//! # Responsibility
//! - Provide the list/get/add entry points callers use.
//! - Run validation before any store write.
//! - Keep validation failures and persistence failures distinct.
//!
//! # Invariants
//! - Service APIs never bypass validation or store locking contracts.
//! - Service layer remains storage-agnostic.

use crate::model::patient::{PatientId, PatientRecord};
use crate::model::validation::{normalize_and_validate, PatientValidationError, RawPatientInput};
use crate::repo::store::{PersistenceError, RecordStore, StoreResult};
use log::debug;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of a rejected add.
#[derive(Debug)]
pub enum AddPatientError {
    /// Input broke one or more rules; nothing was written.
    Validation(PatientValidationError),
    /// The store could not be read or written.
    Persistence(PersistenceError),
}

impl Display for AddPatientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AddPatientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<PatientValidationError> for AddPatientError {
    fn from(value: PatientValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PersistenceError> for AddPatientError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

/// Request body that is not a JSON object.
#[derive(Debug)]
pub enum PayloadError {
    Malformed(serde_json::Error),
    NotAnObject,
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "Invalid JSON body: {err}"),
            Self::NotAnObject => f.write_str("Invalid JSON body: expected an object"),
        }
    }
}

impl Error for PayloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::NotAnObject => None,
        }
    }
}

/// Parses a JSON request body into raw patient input.
pub fn parse_patient_payload(body: &str) -> Result<RawPatientInput, PayloadError> {
    match serde_json::from_str::<Value>(body).map_err(PayloadError::Malformed)? {
        Value::Object(map) => Ok(map),
        _ => Err(PayloadError::NotAnObject),
    }
}

/// Use-case facade over one record store.
pub struct PatientService<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> PatientService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lists every patient in insertion order.
    pub fn list_patients(&self) -> StoreResult<Vec<PatientRecord>> {
        self.store.list_all()
    }

    /// Gets one patient; `None` maps to a not-found response upstream.
    pub fn get_patient(&self, id: PatientId) -> StoreResult<Option<PatientRecord>> {
        self.store.find_by_id(id)
    }

    /// Validates raw input and persists it as a new patient.
    ///
    /// # Contract
    /// - On validation failure the store is not touched.
    /// - Returns the stored record with its assigned id and timestamp.
    pub fn add_patient(&self, raw: &RawPatientInput) -> Result<PatientRecord, AddPatientError> {
        let patient = normalize_and_validate(raw).map_err(|err| {
            debug!(
                "event=patient_add module=service status=rejected issue_count={}",
                err.issues().len()
            );
            err
        })?;
        Ok(self.store.add(patient)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_patient_payload, PayloadError};

    #[test]
    fn payload_must_be_a_json_object() {
        let map = parse_patient_payload(r#"{"name":"Alice","age":"25"}"#).unwrap();
        assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("Alice"));

        assert!(matches!(
            parse_patient_payload("[1,2]"),
            Err(PayloadError::NotAnObject)
        ));
        assert!(matches!(
            parse_patient_payload("{not json"),
            Err(PayloadError::Malformed(_))
        ));
    }
}
