use httpmock::prelude::*;
use nomina::NominaError;
use nomina::ingest::RecordParser;
use nomina::model::PayrollRecord;
use nomina::remote::{CallerIdentity, RecordMirror, RestRecordStore, mirror_records};
use nomina::test_utils::fixtures::record_line;
use serde_json::json;

const TABLE: &str = "payroll_records";
const API_KEY: &str = "anon-key";

fn record(rfc: &str) -> PayrollRecord {
    RecordParser::default()
        .parse_line(&record_line(rfc, "JUAN PEREZ LOPEZ", &[("SUELDO", "1500"), ("ISR", "-200")]))
        .expect("fixture line parses")
}

fn identity() -> CallerIdentity {
    CallerIdentity::new("user-1", "token-1")
}

fn store(server: &MockServer) -> RestRecordStore {
    RestRecordStore::new(&server.base_url(), API_KEY, TABLE).unwrap()
}

#[test]
fn test_save_posts_row_with_credentials() {
    let server = MockServer::start();
    let insert = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/payroll_records")
            .header("apikey", API_KEY)
            .header("authorization", "Bearer token-1")
            .header("prefer", "return=minimal");
        then.status(201);
    });

    store(&server)
        .save_record(Some(&identity()), &record("ABCD800101AAA"))
        .unwrap();
    insert.assert();
}

#[test]
fn test_save_without_identity_sends_nothing() {
    let server = MockServer::start();
    let insert = server.mock(|when, then| {
        when.method(POST).path("/rest/v1/payroll_records");
        then.status(201);
    });

    let err = store(&server)
        .save_record(None, &record("ABCD800101AAA"))
        .unwrap_err();
    assert!(matches!(err, NominaError::NotAuthenticated));

    let blank = CallerIdentity::new("  ", "token-1");
    let err = store(&server)
        .save_record(Some(&blank), &record("ABCD800101AAA"))
        .unwrap_err();
    assert!(matches!(err, NominaError::NotAuthenticated));
    insert.assert_calls(0);
}

#[test]
fn test_unauthorized_response_maps_to_not_authenticated() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/payroll_records");
        then.status(401).body("{\"message\":\"JWT expired\"}");
    });

    let err = store(&server)
        .save_record(Some(&identity()), &record("ABCD800101AAA"))
        .unwrap_err();
    assert!(matches!(err, NominaError::NotAuthenticated));
}

#[test]
fn test_server_error_keeps_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/payroll_records");
        then.status(500).body("boom");
    });

    let err = store(&server)
        .save_record(Some(&identity()), &record("ABCD800101AAA"))
        .unwrap_err();
    match err {
        NominaError::Remote(message) => {
            assert!(message.contains("500"), "{message}");
            assert!(message.contains("boom"), "{message}");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[test]
fn test_fetch_filters_by_caller() {
    let server = MockServer::start();
    let select = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v1/payroll_records")
            .query_param("select", "*")
            .query_param("user_id", "eq.user-1")
            .header("apikey", API_KEY);
        then.status(200).json_body(json!([{
            "user_id": "user-1",
            "plaza": "0701",
            "grupo": "A1",
            "rfc": "ABCD800101AAA",
            "nombre": "JUAN PEREZ LOPEZ",
            "liquido": 150000.0,
            "cct": "15DPR0001Z",
            "cheque": "1000001",
            "puesto_cdc": "DOCENTE",
            "desde_pag": "20240101",
            "hasta_pag": "20240115",
            "motivo": "ORD",
            "conceptos": ["SUELDO", "ISR"],
            "importes": [1500.0, -200.0],
            "created_at": "2024-01-16T10:00:00Z"
        }]));
    });

    let rows = store(&server).fetch_records(Some(&identity())).unwrap();
    select.assert();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "user-1");

    let local = rows.into_iter().next().unwrap().into_record().unwrap();
    assert_eq!(local.rfc(), "ABCD800101AAA");
    assert_eq!(local.importes(), [1500.0, -200.0]);
    assert!((local.liquido_pesos() - 1500.0).abs() < f64::EPSILON);
}

#[test]
fn test_mirror_counts_failures_and_continues() {
    let server = MockServer::start();
    let ok = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/payroll_records")
            .body_includes("ABCD800101AAA");
        then.status(201);
    });
    let rejected = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/payroll_records")
            .body_includes("EFGH900202BBB");
        then.status(409).body("duplicate key");
    });

    let records = [
        record("ABCD800101AAA"),
        record("EFGH900202BBB"),
        record("ABCD800101AAA"),
    ];
    let report = mirror_records(&store(&server), Some(&identity()), &records).unwrap();

    assert_eq!(report.saved, 2);
    assert_eq!(report.failed, 1);
    assert!(report.errors[0].contains("duplicate key"));
    ok.assert_calls(2);
    rejected.assert();
}

#[test]
fn test_from_config_requires_url_and_key() {
    let mut config = nomina::config::RemoteConfig::default();
    assert!(matches!(
        RestRecordStore::from_config(&config),
        Err(NominaError::MissingConfig(_))
    ));
    config.url = Some("http://localhost:54321".to_string());
    assert!(matches!(
        RestRecordStore::from_config(&config),
        Err(NominaError::MissingConfig(_))
    ));
    config.api_key = Some(API_KEY.to_string());
    assert!(RestRecordStore::from_config(&config).is_ok());
}
