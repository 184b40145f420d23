//! Records written by a writer read back unchanged

use crate::test_utils::*;
use futures::{SinkExt, StreamExt, TryStreamExt};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use stratastream::{CursorDirection, CursorReader, RecordWriter};

#[tokio::test]
async fn test_forward_reader_into_writer() {
    let source = engine();
    seed(&source, "source", test_data()).await;
    let target = engine();

    let reader = CursorReader::new(shared(&source), options("source"));
    let writer = RecordWriter::new(shared(&target), options("target"));
    reader.forward(writer).await.unwrap();

    let copied: Vec<Value> = CursorReader::new(shared(&target), options("target"))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(copied, test_data());
    assert_eq!(source.open_connections(), 0);
    assert_eq!(target.open_connections(), 0);
}

fn records(ids: &BTreeSet<i64>) -> Vec<Value> {
    ids.iter()
        .map(|id| json!({"id": id, "value": format!("v{}", id), "index": id % 3}))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_round_trip_preserves_records(
        ids in prop::collection::btree_set(-1000i64..1000, 0..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (forward, backward) = runtime.block_on(async {
            let engine = engine();
            let mut writer = RecordWriter::new(shared(&engine), options("prop"));
            writer
                .send_all(&mut futures::stream::iter(records(&ids).into_iter().map(Ok)))
                .await
                .unwrap();
            let forward: Vec<Value> = CursorReader::new(shared(&engine), options("prop"))
                .try_collect()
                .await
                .unwrap();
            let backward: Vec<Value> = CursorReader::new(
                shared(&engine),
                options("prop").direction(CursorDirection::Prev),
            )
            .try_collect()
            .await
            .unwrap();
            (forward, backward)
        });

        prop_assert_eq!(&forward, &records(&ids));
        let mut reversed = backward;
        reversed.reverse();
        prop_assert_eq!(forward, reversed);
    }

    #[test]
    fn prop_unique_index_yields_each_value_once(
        ids in prop::collection::btree_set(0i64..500, 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let values: Vec<Value> = runtime.block_on(async {
            let engine = engine();
            let mut writer = RecordWriter::new(shared(&engine), options("prop"));
            writer
                .send_all(&mut futures::stream::iter(records(&ids).into_iter().map(Ok)))
                .await
                .unwrap();
            CursorReader::new(
                shared(&engine),
                options("prop").index(INDEX).direction(CursorDirection::NextUnique),
            )
            .map(|r| r.map(|record| record["index"].clone()))
            .try_collect()
            .await
            .unwrap()
        });

        let distinct: BTreeSet<i64> = ids.iter().map(|id| id % 3).collect();
        prop_assert_eq!(values.len(), distinct.len());
    }
}
