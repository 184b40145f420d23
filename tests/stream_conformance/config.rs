//! Options loaded from TOML drive the adapters

use crate::test_utils::*;
use futures::TryStreamExt;
use serde_json::{json, Value};
use stratastream::{CursorDirection, CursorReader, StreamOptions, WriteMode};

#[test]
fn test_defaults_from_minimal_document() {
    let options = StreamOptions::from_toml_str(
        r#"
store = "app"
collection = "items"
"#,
    )
    .unwrap();
    assert_eq!(options.store_version, 1);
    assert_eq!(options.direction, CursorDirection::Next);
    assert_eq!(options.write_mode, WriteMode::PerRecord);
    assert!(options.index.is_none());
    assert!(options.range.is_none());
}

#[test]
fn test_invalid_document_is_rejected() {
    let err = StreamOptions::from_toml_str("store = 1").unwrap_err();
    assert!(err.to_string().contains("invalid stream options"));
}

#[tokio::test]
async fn test_reader_configured_from_toml() {
    let engine = engine();
    seed(&engine, "configured", test_data()).await;
    let options = StreamOptions::from_toml_str(
        r#"
store = "configured"
collection = "test-store"
index = "index"
direction = "prevunique"

[range]
lower = "b"
upper = "d"
"#,
    )
    .unwrap();

    let records: Vec<Value> = CursorReader::new(shared(&engine), options)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(field(&records, "index"), vec![&json!("d"), &json!("c"), &json!("b")]);
}
