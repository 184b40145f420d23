//! Writer conformance: sequential inserts, failures, connection modes

use crate::test_utils::*;
use futures::{stream, SinkExt, TryStreamExt};
use serde_json::{json, Value};
use stratastream::{CursorReader, RecordWriter, WriteMode, WriterState};

const STORE: &str = "test-db-write";

async fn stored(engine: &stratastream::MemoryEngine) -> Vec<Value> {
    CursorReader::new(shared(engine), options(STORE))
        .try_collect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_writes_every_record() {
    init_tracing();
    let engine = engine();
    let mut writer = RecordWriter::new(shared(&engine), options(STORE));
    writer
        .send_all(&mut stream::iter(test_data().into_iter().map(Ok)))
        .await
        .unwrap();
    writer.close().await.unwrap();

    assert_eq!(writer.inserted(), 6);
    assert_eq!(stored(&engine).await, test_data());
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_duplicate_key_surfaces_once() {
    let engine = engine();
    seed(&engine, STORE, test_data()).await;
    let mut writer = RecordWriter::new(shared(&engine), options(STORE));

    let err = writer.send(test_data()[0].clone()).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(writer.state(), WriterState::Errored);
    assert!(writer.send(json!({"id": 100})).await.is_err());
    assert_eq!(writer.inserted(), 0);
    assert_eq!(stored(&engine).await, test_data());
}

#[tokio::test]
async fn test_missing_collection() {
    let engine = engine();
    let options = stratastream::StreamOptions::new(STORE, "n-a");
    let mut writer = RecordWriter::new(shared(&engine), options);
    let err = writer.send(json!({"id": 1})).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
    assert_eq!(engine.open_connections(), 0);
}

#[tokio::test]
async fn test_partial_failure_keeps_earlier_records() {
    let engine = engine();
    let mut writer = RecordWriter::new(shared(&engine), options(STORE));
    let mut input = stream::iter(
        vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 2}), json!({"id": 3})]
            .into_iter()
            .map(Ok),
    );
    assert!(writer.send_all(&mut input).await.unwrap_err().is_already_exists());
    assert_eq!(writer.inserted(), 2);
    assert_eq!(stored(&engine).await, vec![json!({"id": 1}), json!({"id": 2})]);
}

#[tokio::test]
async fn test_shared_connection_mode() {
    let engine = engine();
    let mut writer = RecordWriter::new(
        shared(&engine),
        options(STORE).write_mode(WriteMode::SharedConnection),
    );
    for record in test_data() {
        writer.send(record).await.unwrap();
        assert_eq!(engine.open_connections(), 1);
    }
    writer.close().await.unwrap();
    assert_eq!(engine.open_connections(), 0);
    assert_eq!(stored(&engine).await, test_data());
}

#[tokio::test]
async fn test_writer_moves_between_tasks() {
    let engine = engine();
    let mut writer = RecordWriter::new(shared(&engine), options(STORE));
    let handle = tokio::spawn(async move {
        writer.send(json!({"id": 7})).await?;
        writer.close().await
    });
    handle.await.unwrap().unwrap();
    assert_eq!(stored(&engine).await, vec![json!({"id": 7})]);
}
