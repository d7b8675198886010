use graphcsv::client::{BlockScopedData, BlockStream, Clock, ReplayStream, StreamMessage};
use std::io::Write;

fn data(number: u64, payload: &[u8]) -> StreamMessage {
    StreamMessage::BlockScopedData(BlockScopedData {
        clock: Clock {
            number,
            id: format!("block-{number}"),
        },
        output_module: "graph_out".to_string(),
        payload: payload.to_vec(),
        cursor: format!("cursor-{number}"),
    })
}

#[tokio::test]
async fn replay_round_trips_messages() {
    let messages = [
        data(1, b"first payload"),
        data(2, b""),
        StreamMessage::Undo {
            last_valid_block: 1,
        },
    ];

    let mut file = tempfile::NamedTempFile::new().expect("replay file");
    for message in &messages {
        let line = ReplayStream::encode_record(message).expect("encodable");
        writeln!(file, "{line}").expect("write line");
    }
    file.flush().expect("flush");

    let mut stream = ReplayStream::open(file.path()).expect("open");
    for expected in &messages {
        let actual = stream
            .next_message()
            .await
            .expect("read")
            .expect("message present");
        assert_eq!(*expected, actual);
    }
    assert!(stream.next_message().await.expect("read").is_none());
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let mut file = tempfile::NamedTempFile::new().expect("replay file");
    writeln!(file).expect("blank line");
    writeln!(
        file,
        "{}",
        ReplayStream::encode_record(&data(5, b"x")).expect("encodable")
    )
    .expect("write line");
    file.flush().expect("flush");

    let mut stream = ReplayStream::open(file.path()).expect("open");
    let message = stream
        .next_message()
        .await
        .expect("read")
        .expect("message present");
    assert_eq!(data(5, b"x"), message);
}

#[tokio::test]
async fn malformed_line_reports_position() {
    let mut file = tempfile::NamedTempFile::new().expect("replay file");
    writeln!(file, "not json at all").expect("write line");
    file.flush().expect("flush");

    let mut stream = ReplayStream::open(file.path()).expect("open");
    let err = stream.next_message().await.unwrap_err().to_string();
    assert!(err.contains("line 1"), "unexpected error: {err}");
}
