//! Patient domain model.
//!
//! # Responsibility
//! - Define the persisted patient record and its validated insert shape.
//! - Parse patient ids received at the caller boundary.
//!
//! # Invariants
//! - `id` is positive, unique per store and never reassigned.
//! - `NewPatient` values only come out of validation, so stores never see
//!   unvalidated input.
//! - `created_at` is assigned by the store and never changes afterwards.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned patient identifier.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type PatientId = i64;

/// Canonical persisted patient record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Written as a JSON number; numeric strings are accepted on read.
    #[serde(deserialize_with = "deserialize_patient_id")]
    pub id: PatientId,
    pub name: String,
    /// Same number-or-numeric-string leniency as `id`.
    #[serde(deserialize_with = "deserialize_patient_age")]
    pub age: i64,
    pub email: String,
    pub condition: String,
    /// Insertion timestamp, RFC 3339 in UTC.
    pub created_at: DateTime<Utc>,
}

/// Validated patient fields awaiting id and timestamp assignment.
///
/// Construct through [`crate::normalize_and_validate`] or [`NewPatient::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub(crate) name: String,
    pub(crate) age: i64,
    pub(crate) email: String,
    pub(crate) condition: String,
}

impl NewPatient {
    /// Normalizes and validates typed fields.
    ///
    /// Applies the same trimming and rule set as map-based validation.
    pub fn new(
        name: &str,
        age: i64,
        email: &str,
        condition: &str,
    ) -> Result<Self, crate::model::validation::PatientValidationError> {
        crate::model::validation::validate_fields(name, age, email, condition)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> i64 {
        self.age
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Finalizes this value into a persisted record.
    pub(crate) fn into_record(self, id: PatientId, created_at: DateTime<Utc>) -> PatientRecord {
        PatientRecord {
            id,
            name: self.name,
            age: self.age,
            email: self.email,
            condition: self.condition,
            created_at,
        }
    }
}

/// Rejected boundary id text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPatientId(pub String);

impl Display for InvalidPatientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid id: `{}`", self.0)
    }
}

impl Error for InvalidPatientId {}

/// Parses a caller-supplied id.
///
/// Only positive decimal integers are accepted.
pub fn parse_patient_id(value: &str) -> Result<PatientId, InvalidPatientId> {
    let trimmed = value.trim();
    match trimmed.parse::<PatientId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(InvalidPatientId(trimmed.to_string())),
    }
}

fn deserialize_patient_id<'de, D>(deserializer: D) -> Result<PatientId, D::Error>
where
    D: Deserializer<'de>,
{
    let id = deserialize_loose_int(deserializer, "patient id")?;
    if id <= 0 {
        return Err(de::Error::custom(format!("patient id must be positive, got {id}")));
    }
    Ok(id)
}

fn deserialize_patient_age<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_loose_int(deserializer, "patient age")
}

/// Integer written either as a JSON number or as a numeric string.
fn deserialize_loose_int<'de, D>(deserializer: D, field: &str) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInt {
        Number(i64),
        Text(String),
    }

    match RawInt::deserialize(deserializer)? {
        RawInt::Number(value) => Ok(value),
        RawInt::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("invalid {field} `{text}`"))),
    }
}
