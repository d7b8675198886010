use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use graphcsv::client::{BlockScopedData, Clock, QueuedStream, StreamMessage};
use graphcsv::entity::{pb, EntityChangeAtBlockNum};
use graphcsv::poi::ProofOfIndexing;
use graphcsv::store::MemoryStore;
use graphcsv::{EntitySink, SinkConfig, SinkError, Value};
use prost::Message as _;
use std::sync::Arc;

const MODULE: &str = "graph_out";

fn sink_config(working_dir: &tempfile::TempDir, stop_block: u64, bundle_size: u64) -> SinkConfig {
    SinkConfig {
        dest_folder: working_dir.path().join("out"),
        working_dir: working_dir.path().join("work"),
        output_module: MODULE.to_string(),
        start_block: 0,
        stop_block,
        bundle_size,
        buffer_size: 1024,
        chain_id: "testnet".to_string(),
        start_poi: None,
    }
}

fn pb_change(id: &str, operation: pb::entity_change::Operation, value: i64) -> pb::EntityChange {
    pb::EntityChange {
        entity: "Member".to_string(),
        id: id.to_string(),
        ordinal: 0,
        operation: operation as i32,
        fields: vec![pb::Field {
            name: "balance".to_string(),
            new_value: Some(pb::Value {
                typed: Some(pb::value::Typed::Bigint(value.to_string())),
            }),
            old_value: None,
        }],
    }
}

fn block_message(number: u64, changes: Vec<pb::EntityChange>) -> StreamMessage {
    let payload = pb::EntityChanges {
        entity_changes: changes,
    }
    .encode_to_vec();

    StreamMessage::BlockScopedData(BlockScopedData {
        clock: Clock {
            number,
            id: format!("block-{number}"),
        },
        output_module: MODULE.to_string(),
        payload,
        cursor: format!("cursor-{number}"),
    })
}

fn store_text(store: &MemoryStore, name: &str) -> String {
    String::from_utf8(store.all_objects().remove(name).unwrap_or_else(|| {
        panic!(
            "missing object {name}; have {:?}",
            store.all_objects().keys().collect::<Vec<_>>()
        )
    }))
    .expect("utf-8")
}

fn jsonl_records(text: &str) -> Vec<EntityChangeAtBlockNum> {
    text.lines()
        .map(|line| serde_json::from_str(line).expect("jsonl record"))
        .collect()
}

#[tokio::test]
async fn sink_bundles_changes_and_chains_poi() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);
    let store = MemoryStore::new();

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(store.clone()),
    )
    .expect("sink");

    let mut stream = QueuedStream::new([
        block_message(
            1,
            vec![pb_change("m1", pb::entity_change::Operation::Create, 100)],
        ),
        block_message(
            3,
            vec![pb_change("m1", pb::entity_change::Operation::Update, 250)],
        ),
        block_message(
            7,
            vec![pb_change("m1", pb::entity_change::Operation::Delete, 0)],
        ),
    ]);

    sink.run(&mut stream).await.expect("run");

    // Entity bundles cover the whole range, with the change records routed
    // by canonical entity key.
    let first = store_text(&store, "member/0000000000-0000000004");
    let records = jsonl_records(&first);
    assert_eq!(2, records.len());
    assert_eq!(1, records[0].block_num);
    assert_eq!("m1", records[0].entity_change.id);
    assert_eq!(3, records[1].block_num);

    let second = store_text(&store, "member/0000000005-0000000009");
    assert_eq!(1, jsonl_records(&second).len());

    // POI rows carry base64 digests that replay to the same chain.
    let poi_text = [
        store_text(&store, "poi2$/0000000000-0000000004"),
        store_text(&store, "poi2$/0000000005-0000000009"),
    ]
    .concat();
    let poi_records = jsonl_records(&poi_text);
    assert_eq!(3, poi_records.len());

    let mut prev: Option<Vec<u8>> = None;
    for (record, block) in poi_records.iter().zip([1u64, 3, 7]) {
        assert_eq!(block, record.block_num);
        assert_eq!("poi2$", record.entity_change.entity);
        assert_eq!("testnet", record.entity_change.id);

        let digest = match &record.entity_change.fields[0].new_value {
            Value::Bytes(encoded) => STANDARD.decode(encoded).expect("digest base64"),
            other => panic!("poi digest should be bytes, got {other:?}"),
        };

        let mut replay = ProofOfIndexing::new(block);
        let original = match block {
            1 => pb_change("m1", pb::entity_change::Operation::Create, 100),
            3 => pb_change("m1", pb::entity_change::Operation::Update, 250),
            _ => pb_change("m1", pb::entity_change::Operation::Delete, 0),
        };
        let change = original.try_into().expect("domain change");
        if block == 7 {
            replay.remove_entity(&change);
        } else {
            replay.set_entity(&change);
        }
        let expected = replay.pause(prev.as_deref()).expect("pause");

        assert_eq!(expected.to_vec(), digest, "digest at block {block}");
        prev = Some(digest);
    }

    // Sidecar records the last processed block and its hash.
    assert_eq!("7:block-7\n", store_text(&store, "last_block.txt"));
}

#[tokio::test]
async fn empty_blocks_still_pause_the_poi_chain() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);
    let store = MemoryStore::new();

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(store.clone()),
    )
    .expect("sink");

    let mut stream = QueuedStream::new([
        block_message(
            1,
            vec![pb_change("m1", pb::entity_change::Operation::Create, 1)],
        ),
        block_message(2, Vec::new()),
    ]);

    sink.run(&mut stream).await.expect("run");

    // The empty block pauses to a digest chained through block 1's, which
    // differs, so a second poi row appears.
    let poi_text = store_text(&store, "poi2$/0000000000-0000000004");
    assert_eq!(2, jsonl_records(&poi_text).len());
}

#[tokio::test]
async fn undo_signal_is_fatal() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(MemoryStore::new()),
    )
    .expect("sink");

    let mut stream = QueuedStream::new([StreamMessage::Undo {
        last_valid_block: 1,
    }]);

    let err = sink.run(&mut stream).await.unwrap_err();
    assert!(matches!(err, SinkError::UndoSignal));
}

#[tokio::test]
async fn wrong_output_module_is_fatal() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(MemoryStore::new()),
    )
    .expect("sink");

    let message = match block_message(1, Vec::new()) {
        StreamMessage::BlockScopedData(mut data) => {
            data.output_module = "other_module".to_string();
            StreamMessage::BlockScopedData(data)
        }
        _ => unreachable!(),
    };
    let mut stream = QueuedStream::new([message]);

    let err = sink.run(&mut stream).await.unwrap_err();
    assert!(matches!(err, SinkError::WrongOutputModule { .. }));
}

#[tokio::test]
async fn change_for_unknown_entity_is_fatal() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(MemoryStore::new()),
    )
    .expect("sink");

    let mut change = pb_change("x", pb::entity_change::Operation::Create, 1);
    change.entity = "Stranger".to_string();
    let mut stream = QueuedStream::new([block_message(1, vec![change])]);

    let err = sink.run(&mut stream).await.unwrap_err();
    assert!(matches!(err, SinkError::UnknownEntity(_)));
}

#[tokio::test]
async fn non_monotonic_blocks_are_fatal() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(MemoryStore::new()),
    )
    .expect("sink");

    let mut stream = QueuedStream::new([
        block_message(5, Vec::new()),
        block_message(4, Vec::new()),
    ]);

    let err = sink.run(&mut stream).await.unwrap_err();
    assert!(matches!(err, SinkError::NonMonotonicBlock { .. }));
}

#[tokio::test]
async fn blocks_at_or_past_the_stop_block_finish_the_range() {
    let working_dir = tempfile::tempdir().expect("tempdir");
    let config = sink_config(&working_dir, 10, 5);
    let store = MemoryStore::new();

    let mut sink = EntitySink::new(
        &config,
        &["Member".to_string()],
        Arc::new(store.clone()),
    )
    .expect("sink");

    let mut stream = QueuedStream::new([
        block_message(
            2,
            vec![pb_change("m1", pb::entity_change::Operation::Create, 1)],
        ),
        block_message(10, Vec::new()),
        block_message(11, Vec::new()),
    ]);

    sink.run(&mut stream).await.expect("graceful stop");

    // Both bundle boundaries exist even though the stream never produced a
    // block in the second one.
    let names = store.all_objects();
    assert!(names.contains_key("member/0000000000-0000000004"));
    assert!(names.contains_key("member/0000000005-0000000009"));
}
