//! Reader conformance: order, index traversal, cancellation, failures

use crate::test_utils::*;
use futures::{StreamExt, TryStreamExt};
use serde_json::{json, Value};
use stratastream::{
    CursorDirection, CursorReader, KeyRange, ReaderState, StoreError, StreamOptions,
};

const STORE: &str = "test-db-read";

async fn read(options: StreamOptions) -> (Vec<Value>, stratastream::MemoryEngine) {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let records = CursorReader::new(shared(&engine), options)
        .try_collect()
        .await
        .unwrap();
    (records, engine)
}

#[tokio::test]
async fn test_streams_all_records_forward() {
    init_tracing();
    let (records, engine) = read(options(STORE)).await;
    assert_eq!(records, test_data());
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_streams_all_records_backward() {
    let (records, _) = read(options(STORE).direction(CursorDirection::Prev)).await;
    let mut expected = test_data();
    expected.reverse();
    assert_eq!(records, expected);
}

#[tokio::test]
async fn test_streams_index_forward_and_backward() {
    let (forward, _) = read(options(STORE).index(INDEX)).await;
    assert_eq!(forward, test_data());

    let (backward, _) = read(options(STORE).index(INDEX).direction(CursorDirection::Prev)).await;
    let mut expected = test_data();
    expected.reverse();
    assert_eq!(backward, expected);
}

#[tokio::test]
async fn test_streams_unique_index_values() {
    let (forward, _) =
        read(options(STORE).index(INDEX).direction(CursorDirection::NextUnique)).await;
    assert_eq!(
        field(&forward, "index"),
        vec![&json!("a"), &json!("b"), &json!("c"), &json!("d"), &json!("e")]
    );

    let (backward, _) =
        read(options(STORE).index(INDEX).direction(CursorDirection::PrevUnique)).await;
    assert_eq!(
        field(&backward, "index"),
        vec![&json!("e"), &json!("d"), &json!("c"), &json!("b"), &json!("a")]
    );
    // the lowest primary key represents a duplicated index value
    assert_eq!(backward[1]["id"], json!(4));
}

#[tokio::test]
async fn test_index_read_follows_indexed_value() {
    let engine = engine();
    let store = "test-db-index-order";
    seed(
        &engine,
        store,
        vec![
            json!({"id": 1, "index": "c"}),
            json!({"id": 2, "index": "a"}),
            json!({"id": 3, "index": "b"}),
            json!({"id": 4, "index": "a"}),
        ],
    )
    .await;

    let forward: Vec<Value> = CursorReader::new(shared(&engine), options(store).index(INDEX))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(field(&forward, "id"), vec![&json!(2), &json!(4), &json!(3), &json!(1)]);

    let backward: Vec<Value> = CursorReader::new(
        shared(&engine),
        options(store).index(INDEX).direction(CursorDirection::PrevUnique),
    )
    .try_collect()
    .await
    .unwrap();
    assert_eq!(field(&backward, "id"), vec![&json!(1), &json!(3), &json!(2)]);
}

#[tokio::test]
async fn test_key_range_restricts_primary_keys() {
    let range = KeyRange::bound(2, 5, false, true).unwrap();
    let (records, _) = read(options(STORE).range(range)).await;
    assert_eq!(field(&records, "id"), vec![&json!(2), &json!(3), &json!(4)]);

    let (records, _) = read(options(STORE).range(KeyRange::only(6))).await;
    assert_eq!(records, vec![test_data()[5].clone()]);
}

#[tokio::test]
async fn test_destroy_after_first_record() {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let mut reader = CursorReader::new(
        shared(&engine),
        options(STORE).index(INDEX).direction(CursorDirection::NextUnique),
    );

    let mut count = 0;
    while let Some(record) = reader.next().await {
        record.unwrap();
        count += 1;
        reader.destroy();
    }
    assert_eq!(count, 1);
    assert_eq!(reader.state(), ReaderState::Destroyed);
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_take_drops_reader_early() {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let records: Vec<Value> = CursorReader::new(shared(&engine), options(STORE))
        .take(2)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_missing_collection_yields_one_error() {
    let engine = stratastream::MemoryEngine::new();
    let results: Vec<_> = CursorReader::new(shared(&engine), StreamOptions::new("n-a", "n-a"))
        .collect()
        .await;
    assert_eq!(results.len(), 1);
    let err = results[0].clone().unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("not found"));
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_missing_index_yields_one_error() {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let results: Vec<_> = CursorReader::new(shared(&engine), options(STORE).index("n-a"))
        .collect()
        .await;
    assert_eq!(results.len(), 1);
    assert!(results[0].as_ref().unwrap_err().is_not_found());
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_version_downgrade_fails_to_connect() {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let mut reader = CursorReader::new(shared(&engine), options(STORE).version(3));
    reader.next().await.unwrap().unwrap();
    drop(reader);

    let mut reader = CursorReader::new(shared(&engine), options(STORE).version(2));
    let err = reader.next().await.unwrap().unwrap_err();
    assert!(matches!(err, StoreError::Connection { .. }));
    assert!(reader.next().await.is_none());
}

#[tokio::test]
async fn test_reader_moves_between_tasks() {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let reader = CursorReader::new(shared(&engine), options(STORE));
    let records: Vec<Value> = tokio::spawn(async move { reader.try_collect().await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(records, test_data());
}
