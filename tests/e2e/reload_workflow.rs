use std::sync::Arc;

use nomina::ingest::BulkLoader;
use nomina::search::SearchEngine;
use nomina::test_utils::fixtures::{SourceFixture, record_line};

#[tokio::test]
async fn test_reload_swaps_index_and_invalidates_cache() {
    let fixture = SourceFixture::new();
    let engine = Arc::new(SearchEngine::new(Some(50)));

    let first = fixture.write_source(
        "q1.csv",
        &[record_line("ABCD800101AAA", "JUAN PEREZ LOPEZ", &[])],
    );
    engine.spawn_load(BulkLoader::for_path(first)).await.unwrap().unwrap();
    assert_eq!(engine.search_by_name("PEREZ").await.unwrap().len(), 1);
    assert_eq!(engine.search_by_name("PEREZ").await.unwrap().len(), 1);
    assert_eq!(engine.cache_stats().unwrap().hits, 1);

    let second = fixture.write_source(
        "q2.csv",
        &[
            record_line("ABCD800101AAA", "JUAN PEREZ LOPEZ", &[]),
            record_line("EFGH900202BBB", "MARIA GARCIA PEREZ", &[]),
        ],
    );
    engine.spawn_load(BulkLoader::for_path(second)).await.unwrap().unwrap();

    let after = engine.search_by_name("PEREZ").await.unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].nombre(), "JUAN PEREZ LOPEZ");
    assert_eq!(after[1].nombre(), "MARIA GARCIA PEREZ");
}

#[tokio::test]
async fn test_streaming_source_indexes_every_record() {
    let fixture = SourceFixture::new();
    let lines: Vec<String> = (0..500)
        .map(|i| record_line(&format!("STRM{i:06}AAA"), &format!("EMPLEADO NUMERO {i}"), &[("SUELDO", "10")]))
        .collect();
    let path = fixture.write_source("big.csv", &lines);
    let loader = BulkLoader::for_path(path)
        .with_streaming_threshold(1024)
        .with_chunk_size(333)
        .with_batch_size(50);

    let engine = Arc::new(SearchEngine::default());
    let report = engine.spawn_load(loader).await.unwrap().unwrap();
    assert_eq!(report.records(), 500);
    assert_eq!(report.batches_delivered, 10);

    assert_eq!(engine.search_by_name("EMPLEADO").await.unwrap().len(), 500);
    assert_eq!(engine.search_by_rfc("STRM000499AAA").await.unwrap().len(), 1);
    // "M0004" is inside STRM000400AAA ..= STRM000499AAA.
    assert_eq!(engine.search_by_rfc("M0004").await.unwrap().len(), 100);
}
