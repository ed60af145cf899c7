use patient_core::{normalize_and_validate, NewPatient, RawPatientInput, ValidationIssue};
use serde_json::{json, Value};

fn raw(value: Value) -> RawPatientInput {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn valid_input_is_trimmed_and_accepted() {
    let patient = normalize_and_validate(&raw(json!({
        "name": "  Alice ",
        "age": "25",
        "email": " alice@example.com ",
        "condition": "Flu\n",
    })))
    .unwrap();

    assert_eq!(patient.name(), "Alice");
    assert_eq!(patient.age(), 25);
    assert_eq!(patient.email(), "alice@example.com");
    assert_eq!(patient.condition(), "Flu");
}

#[test]
fn every_failed_rule_is_reported_in_field_order() {
    let err = normalize_and_validate(&raw(json!({
        "name": "",
        "age": 200,
        "email": "not-an-email",
        "condition": "",
    })))
    .unwrap_err();

    assert_eq!(
        err.issues(),
        &[
            ValidationIssue::MissingName,
            ValidationIssue::AgeOutOfRange(200),
            ValidationIssue::InvalidEmail,
            ValidationIssue::MissingCondition,
        ]
    );
    assert_eq!(
        err.messages(),
        vec![
            "Name is required.",
            "Age must be between 0 and 150.",
            "Invalid email.",
            "Condition is required.",
        ]
    );
}

#[test]
fn whitespace_only_text_counts_as_missing() {
    let err = normalize_and_validate(&raw(json!({
        "name": "   ",
        "age": 30,
        "email": "bob@example.com",
        "condition": "\t",
    })))
    .unwrap_err();

    assert_eq!(
        err.issues(),
        &[ValidationIssue::MissingName, ValidationIssue::MissingCondition]
    );
}

#[test]
fn missing_keys_default_to_empty_text_and_zero_age() {
    let err = normalize_and_validate(&RawPatientInput::new()).unwrap_err();

    // Age 0 is in range, so only the three text rules fail.
    assert_eq!(
        err.issues(),
        &[
            ValidationIssue::MissingName,
            ValidationIssue::InvalidEmail,
            ValidationIssue::MissingCondition,
        ]
    );
}

#[test]
fn age_bounds_are_inclusive() {
    for age in [0, 150] {
        assert!(NewPatient::new("Carol", age, "carol@example.com", "Checkup").is_ok());
    }
    for age in [-1, 151] {
        let err = NewPatient::new("Carol", age, "carol@example.com", "Checkup").unwrap_err();
        assert_eq!(err.issues(), &[ValidationIssue::AgeOutOfRange(age)]);
    }
}

#[test]
fn non_numeric_age_coerces_to_zero() {
    let patient = normalize_and_validate(&raw(json!({
        "name": "Dan",
        "age": "unknown",
        "email": "dan@example.com",
        "condition": "Sprain",
    })))
    .unwrap();

    assert_eq!(patient.age(), 0);
}

#[test]
fn email_without_dotted_domain_is_rejected() {
    let err = NewPatient::new("Eve", 41, "eve@localhost", "Migraine").unwrap_err();
    assert_eq!(err.issues(), &[ValidationIssue::InvalidEmail]);
}

#[test]
fn validation_is_deterministic() {
    let input = raw(json!({
        "name": " Frank ",
        "age": 12.9,
        "email": "frank@example.org",
        "condition": "Asthma",
    }));

    let first = normalize_and_validate(&input).unwrap();
    let second = normalize_and_validate(&input).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.age(), 12);
}
