//! Shared fixtures

use serde_json::{json, Value};
use std::sync::Arc;
use stratastream::{MemoryEngine, StoreEngine, StreamOptions, TransactionMode};

pub const COLLECTION: &str = "test-store";
pub const INDEX: &str = "index";

/// Install a test-writer subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_data() -> Vec<Value> {
    vec![
        json!({"id": 1, "value": "first", "index": "a"}),
        json!({"id": 2, "value": "second", "index": "b"}),
        json!({"id": 3, "value": "third", "index": "c"}),
        json!({"id": 4, "value": "same", "index": "d"}),
        json!({"id": 5, "value": "same", "index": "d"}),
        json!({"id": 6, "value": "other", "index": "e"}),
    ]
}

/// Engine whose stores get `test-store` keyed by `id`, indexed on `index`
pub fn engine() -> MemoryEngine {
    MemoryEngine::with_upgrade(|upgrade| {
        if !upgrade.has_collection(COLLECTION) {
            upgrade
                .create_collection(COLLECTION, "id")?
                .create_index(INDEX, "index", false)?;
        }
        Ok(())
    })
}

pub fn options(store: &str) -> StreamOptions {
    StreamOptions::new(store, COLLECTION)
}

pub fn shared(engine: &MemoryEngine) -> Arc<dyn StoreEngine> {
    Arc::new(engine.clone())
}

/// Insert `records` into `store` in one transaction, bypassing the writer
pub async fn seed(engine: &MemoryEngine, store: &str, records: Vec<Value>) {
    let connection = engine.open(store, 1).await.unwrap();
    let transaction = connection
        .transaction(&[COLLECTION], TransactionMode::ReadWrite)
        .unwrap();
    let collection = transaction.collection(COLLECTION).unwrap();
    for record in records {
        collection.add(record).await.unwrap();
    }
    transaction.commit().await.unwrap();
    connection.close();
}

pub fn field<'a>(records: &'a [Value], name: &str) -> Vec<&'a Value> {
    records.iter().map(|r| &r[name]).collect()
}
