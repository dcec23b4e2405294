use std::sync::Arc;

use nomina::ingest::BulkLoader;
use nomina::search::{LookupOutcome, QueryKind, SearchEngine, SearchOutcome};
use nomina::test_utils::fixtures::{CsvRow, SourceFixture};

fn single_record_source(fixture: &SourceFixture) -> BulkLoader {
    let line = CsvRow::new("ABCD800101AAA", "JUAN PEREZ LOPEZ")
        .with_item(0, "SUELDO", "1500.00")
        .to_line_with_columns(50);
    assert_eq!(line.split(',').count(), 50);
    BulkLoader::for_path(fixture.write_source("nomina.csv", &[line]))
}

#[tokio::test]
async fn test_single_record_scenario() {
    let fixture = SourceFixture::new();
    let engine = Arc::new(SearchEngine::default());

    let report = engine
        .spawn_load(single_record_source(&fixture))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.records(), 1);
    assert_eq!(report.stats.rejected, 0);

    let by_rfc = engine.search_by_rfc("ABCD800101AAA").await.unwrap();
    assert_eq!(by_rfc.len(), 1);
    let record = &by_rfc[0];
    assert_eq!(record.nombre(), "JUAN PEREZ LOPEZ");
    assert_eq!(record.conceptos(), ["SUELDO"]);
    assert_eq!(record.importes(), [1500.0]);

    let by_name = engine.search_by_name("PEREZ").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id(), record.id());

    assert!(engine.search_by_rfc("ZZZZ").await.unwrap().is_empty());
    assert!(engine.search_by_name("PEREZ GARCIA").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_queries_before_load_wait_instead_of_failing() {
    let fixture = SourceFixture::new();
    let engine = Arc::new(SearchEngine::default());
    let loader = single_record_source(&fixture);

    assert_eq!(
        engine.try_search_by_name("PEREZ").unwrap(),
        SearchOutcome::NotReady
    );

    let pending = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.lookup("juan").await })
    };
    engine.spawn_load(loader).await.unwrap().unwrap();

    match pending.await.unwrap().unwrap() {
        LookupOutcome::Found { matched_by, records } => {
            assert_eq!(matched_by, QueryKind::Name);
            assert_eq!(records.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        engine.try_search_by_rfc("ABCD800101AAA").unwrap(),
        SearchOutcome::Found(found) if found.len() == 1
    ));
}
