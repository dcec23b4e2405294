use nomina::config::StoreConfig;
use nomina::ingest::BulkLoader;
use nomina::storage::{PayrollStore, SeedOutcome};
use nomina::assert_logged;
use nomina::test_utils::fixtures::{CsvRow, SourceFixture, record_line};
use nomina::test_utils::logging::capture_logs;
use rusqlite::Connection;
use tracing::Level;

fn source(fixture: &SourceFixture, rows: usize) -> BulkLoader {
    let lines: Vec<String> = (0..rows)
        .map(|i| {
            CsvRow::new(&format!("RFCA{i:06}AAA"), &format!("EMPLEADO {i:03}"))
                .with_cct(&format!("15DPR{i:04}Z"))
                .with_item(0, "SUELDO", "1500.50")
                .with_item(1, "ISR", "-220.25")
                .with_item(2, "nan", "999")
                .to_line()
        })
        .collect();
    BulkLoader::for_path(fixture.write_source("nomina.csv", &lines))
}

#[test]
fn test_seed_round_trips_loaded_records() {
    let fixture = SourceFixture::new();
    let loader = source(&fixture, 5);
    let (loaded, _) = loader.load_all().unwrap();

    let store = PayrollStore::open(fixture.path("db/payroll.sqlite"), &StoreConfig::default()).unwrap();
    let report = store.insert_records(&loaded);
    assert!(report.is_clean());

    for original in &loaded {
        let stored = store.get(&original.id()).unwrap().expect("row stored");
        assert_eq!(&stored.record, original);
        assert_eq!(stored.record.conceptos(), ["SUELDO", "ISR"]);
        assert_eq!(stored.record.importes(), [1500.5, -220.25]);
    }
}

#[test]
fn test_ensure_seeded_loads_once() {
    let fixture = SourceFixture::new();
    let loader = source(&fixture, 230);
    let store = PayrollStore::open(fixture.path("payroll.sqlite"), &StoreConfig::default()).unwrap();

    match store.ensure_seeded(&loader).unwrap() {
        SeedOutcome::Seeded { load, insert } => {
            assert_eq!(load.records(), 230);
            assert_eq!(insert.inserted, 230);
            assert_eq!(insert.failed_batches, 0);
        }
        other => panic!("expected a seed, got {other:?}"),
    }
    match store.ensure_seeded(&loader).unwrap() {
        SeedOutcome::AlreadySeeded { records } => assert_eq!(records, 230),
        other => panic!("expected no reload, got {other:?}"),
    }

    // Forced reload replaces rather than duplicates.
    store.reload(&loader).unwrap();
    assert_eq!(store.count().unwrap(), 230);
}

#[test]
fn test_streaming_seed_matches_whole_seed() {
    let fixture = SourceFixture::new();
    let whole = source(&fixture, 120);
    let streaming = whole
        .clone()
        .with_streaming_threshold(0)
        .with_chunk_size(211)
        .with_batch_size(50);

    let a = PayrollStore::open(fixture.path("a.sqlite"), &StoreConfig::default()).unwrap();
    let b = PayrollStore::open(fixture.path("b.sqlite"), &StoreConfig::default()).unwrap();
    a.ensure_seeded(&whole).unwrap();
    b.ensure_seeded(&streaming).unwrap();

    let names = |store: &PayrollStore| -> Vec<String> {
        store
            .browse(1000)
            .unwrap()
            .into_iter()
            .map(|row| row.record.nombre().to_string())
            .collect()
    };
    assert_eq!(names(&a), names(&b));
    assert_eq!(a.count().unwrap(), 120);
}

#[test]
fn test_reload_from_vanished_source_keeps_store() {
    let fixture = SourceFixture::new();
    let loader = source(&fixture, 40);
    let store = PayrollStore::open(fixture.path("payroll.sqlite"), &StoreConfig::default()).unwrap();
    store.ensure_seeded(&loader).unwrap();

    std::fs::remove_file(fixture.path("nomina.csv")).unwrap();
    let (result, logs) = capture_logs(Level::WARN, || store.reload(&loader));
    assert!(result.is_err());
    assert_eq!(store.count().unwrap(), 40);
    assert_eq!(store.search("EMPLEADO 007", 5).unwrap().len(), 1);
    // Resolution fails before the store is touched.
    assert!(!logs.contains(Level::WARN, "store batch rolled back"));
}

#[test]
fn test_schema_on_disk() {
    let fixture = SourceFixture::new();
    let path = fixture.path("payroll.sqlite");
    let store = PayrollStore::open(&path, &StoreConfig::default()).unwrap();
    store.insert_records(&source(&fixture, 1).load_all().unwrap().0);
    drop(store);

    let conn = Connection::open(&path).expect("open db");
    let (conceptos, importes): (String, String) = conn
        .query_row(
            "SELECT conceptos, importes FROM payroll_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("query row");
    assert_eq!(conceptos, r#"["SUELDO","ISR"]"#);
    assert_eq!(importes, "[1500.5,-220.25]");

    let fts_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM payroll_fts", [], |row| row.get(0))
        .expect("query fts");
    assert_eq!(fts_rows, 1);
}

#[test]
fn test_cct_is_searchable() {
    let fixture = SourceFixture::new();
    let store = PayrollStore::open(fixture.path("payroll.sqlite"), &StoreConfig::default()).unwrap();
    store.ensure_seeded(&source(&fixture, 12)).unwrap();

    let found = store.search("15dpr0011", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].record.cct(), "15DPR0011Z");
    assert_eq!(store.search("EMPLEADO", 5).unwrap().len(), 5);
}

#[test]
fn test_failing_store_batch_does_not_stop_the_load() {
    let fixture = SourceFixture::new();
    let lines = vec![
        record_line("AAAA800101AAA", "UNO", &[]),
        record_line("BBBB800101AAA", "DOS", &[]),
    ];
    let loader = BulkLoader::for_path(fixture.write_source("n.csv", &lines));
    let store = PayrollStore::open(fixture.path("payroll.sqlite"), &StoreConfig::default()).unwrap();

    // Same records twice: the second pass collides on primary keys.
    let (records, _) = loader.load_all().unwrap();
    assert!(store.insert_records(&records).is_clean());
    let (again, logs) = capture_logs(Level::WARN, || store.insert_records(&records));
    assert_logged!(logs, Level::WARN, "store batch rolled back");
    assert_eq!(
        logs.find(Level::WARN, "rolled back").and_then(|e| e.field("records")),
        Some("2")
    );
    assert_eq!(again.inserted, 0);
    assert_eq!(again.failed_batches, 1);
    assert_eq!(store.count().unwrap(), 2);
}
