use patient_core::{
    open_record_store, parse_patient_payload, AddPatientError, JsonFileStore, PatientService,
    RawPatientInput, RecordStore, SqliteRecordStore, StoreBackend, StoreConfig,
};
use serde_json::{json, Value};
use std::fs;

fn raw(value: Value) -> RawPatientInput {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn alice() -> RawPatientInput {
    raw(json!({
        "name": "Alice",
        "age": 25,
        "email": "alice@example.com",
        "condition": "Flu",
    }))
}

#[test]
fn add_patient_assigns_id_and_returns_full_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("patients.json")).unwrap();
    let service = PatientService::new(store);

    let record = service.add_patient(&alice()).unwrap();
    assert_eq!(record.id, 1);
    assert_eq!(record.name, "Alice");
    assert_eq!(record.age, 25);
    assert_eq!(record.email, "alice@example.com");
    assert_eq!(record.condition, "Flu");

    assert_eq!(service.get_patient(1).unwrap(), Some(record.clone()));
    assert_eq!(service.list_patients().unwrap(), vec![record]);
}

#[test]
fn invalid_input_reports_all_messages_and_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.json");
    let service = PatientService::new(JsonFileStore::open(&path).unwrap());

    let err = service
        .add_patient(&raw(json!({
            "name": "",
            "age": 200,
            "email": "not-an-email",
            "condition": "",
        })))
        .unwrap_err();

    match err {
        AddPatientError::Validation(validation) => assert_eq!(validation.messages().len(), 4),
        other => panic!("expected validation error, got {other}"),
    }
    assert!(service.list_patients().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn persistence_failure_is_distinct_from_validation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patients.json");
    fs::create_dir_all(&path).unwrap();
    let service = PatientService::new(JsonFileStore::open(&path).unwrap());

    let err = service.add_patient(&alice()).unwrap_err();
    assert!(matches!(err, AddPatientError::Persistence(_)), "unexpected: {err}");
}

#[test]
fn json_body_flows_through_to_the_store() {
    let service = PatientService::new(SqliteRecordStore::open_in_memory().unwrap());

    let body = r#"{"name":" Bea ","age":"67","email":"bea@example.com","condition":"Arthritis"}"#;
    let record = service
        .add_patient(&parse_patient_payload(body).unwrap())
        .unwrap();

    assert_eq!(record.name, "Bea");
    assert_eq!(record.age, 67);
    assert_eq!(service.store().find_by_id(record.id).unwrap(), Some(record));
}

#[test]
fn configured_backends_share_one_contract() {
    let dir = tempfile::tempdir().unwrap();

    for backend in [StoreBackend::Json, StoreBackend::Sqlite] {
        let config = StoreConfig {
            backend,
            path: dir.path().join(format!("store-{}", backend.as_str())),
            lock_timeout: None,
        };
        let service = PatientService::new(open_record_store(&config).unwrap());

        assert!(service.list_patients().unwrap().is_empty());
        let first = service.add_patient(&alice()).unwrap();
        let second = service.add_patient(&alice()).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(service.get_patient(2).unwrap(), Some(second.clone()));
        assert_eq!(service.get_patient(3).unwrap(), None);
        assert_eq!(service.list_patients().unwrap(), vec![first, second]);
    }
}
