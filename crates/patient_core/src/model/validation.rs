//! Patient input normalization and validation.
//!
//! # Responsibility
//! - Turn a loosely typed input map into a normalized `NewPatient`.
//! - Report every rule violation at once instead of stopping at the first.
//!
//! # Invariants
//! - Pure: no I/O and no shared mutable state.
//! - Issues are reported in field order: name, age, email, condition.

use crate::model::patient::NewPatient;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raw caller input keyed by field name.
pub type RawPatientInput = Map<String, Value>;

/// Inclusive lower bound for patient age.
pub const MIN_PATIENT_AGE: i64 = 0;
/// Inclusive upper bound for patient age.
pub const MAX_PATIENT_AGE: i64 = 150;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("valid email regex")
});
/// Longest accepted local part, in bytes.
const MAX_EMAIL_LOCAL_LEN: usize = 64;
/// Longest accepted address, in bytes.
const MAX_EMAIL_LEN: usize = 254;

static LEADING_INT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+").expect("valid leading integer regex"));

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingName,
    AgeOutOfRange(i64),
    InvalidEmail,
    MissingCondition,
}

impl ValidationIssue {
    /// Human-readable message shown to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingName => "Name is required.",
            Self::AgeOutOfRange(_) => "Age must be between 0 and 150.",
            Self::InvalidEmail => "Invalid email.",
            Self::MissingCondition => "Condition is required.",
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Complete set of rule violations for one input.
///
/// Never empty when returned from validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientValidationError {
    issues: Vec<ValidationIssue>,
}

impl PatientValidationError {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Messages in rule order, ready for display.
    pub fn messages(&self) -> Vec<String> {
        self.issues
            .iter()
            .map(|issue| issue.message().to_string())
            .collect()
    }
}

impl Display for PatientValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid patient input: {}", self.messages().join(" "))
    }
}

impl Error for PatientValidationError {}

/// Normalizes a raw input map and validates it.
///
/// Missing keys are treated as empty text or age zero.
pub fn normalize_and_validate(raw: &RawPatientInput) -> Result<NewPatient, PatientValidationError> {
    let name = coerce_text(raw.get("name"));
    let age = coerce_age(raw.get("age"));
    let email = coerce_text(raw.get("email"));
    let condition = coerce_text(raw.get("condition"));

    validate_fields(&name, age, &email, &condition)
}

pub(crate) fn validate_fields(
    name: &str,
    age: i64,
    email: &str,
    condition: &str,
) -> Result<NewPatient, PatientValidationError> {
    let name = name.trim();
    let email = email.trim();
    let condition = condition.trim();

    let mut issues = Vec::new();
    if name.is_empty() {
        issues.push(ValidationIssue::MissingName);
    }
    if !(MIN_PATIENT_AGE..=MAX_PATIENT_AGE).contains(&age) {
        issues.push(ValidationIssue::AgeOutOfRange(age));
    }
    if !is_valid_email(email) {
        issues.push(ValidationIssue::InvalidEmail);
    }
    if condition.is_empty() {
        issues.push(ValidationIssue::MissingCondition);
    }

    if !issues.is_empty() {
        return Err(PatientValidationError { issues });
    }

    Ok(NewPatient {
        name: name.to_string(),
        age,
        email: email.to_string(),
        condition: condition.to_string(),
    })
}

/// Returns whether `value` looks like `local@domain.tld`.
///
/// Local part is capped at 64 bytes, each domain label at 63 and the whole
/// address at 254.
pub fn is_valid_email(value: &str) -> bool {
    if value.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(value) {
        return false;
    }
    value
        .split_once('@')
        .map_or(false, |(local, _)| local.len() <= MAX_EMAIL_LOCAL_LEN)
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(true)) => "1".to_string(),
        _ => String::new(),
    }
}

fn coerce_age(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(truncate_float))
            .unwrap_or(0),
        Some(Value::String(text)) => coerce_age_text(text),
        Some(Value::Bool(true)) => 1,
        _ => 0,
    }
}

fn coerce_age_text(text: &str) -> i64 {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return truncate_float(value);
        }
    }
    LEADING_INT_RE
        .find(trimmed)
        .and_then(|prefix| prefix.as_str().parse::<i64>().ok())
        .unwrap_or(0)
}

// Saturating cast; NaN maps to 0.
fn truncate_float(value: f64) -> i64 {
    value.trunc() as i64
}
