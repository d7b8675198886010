//! Upstream block-stream seam.
//!
//! The live streaming RPC client is an external collaborator; the sink only
//! requires something that yields ordered, final-only block-scoped messages.
//! [`ReplayStream`] replays a captured stream from a local JSONL file for
//! backfills and tests, and [`QueuedStream`] feeds messages from memory.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Block identification attached to every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub number: u64,
    pub id: String,
}

/// One block-scoped message: the named output module's payload plus a resume
/// cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockScopedData {
    pub clock: Clock,
    pub output_module: String,
    pub payload: Vec<u8>,
    pub cursor: String,
}

/// Messages a block stream can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    BlockScopedData(BlockScopedData),
    /// A chain reorganization signal. The sink requires final-only delivery,
    /// so receiving one is fatal.
    Undo { last_valid_block: u64 },
}

/// Errors surfaced by block-stream implementations.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("replay file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("replay file {path:?} line {line}: {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("replay file {path:?} line {line}: invalid payload base64: {source}")]
    Payload {
        path: PathBuf,
        line: usize,
        source: base64::DecodeError,
    },
}

/// Ordered source of block-scoped messages.
#[async_trait]
pub trait BlockStream: Send {
    /// Next message, or `None` when the stream is exhausted.
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, StreamError>;
}

/// On-disk representation of one replayed message.
#[derive(Debug, Serialize, Deserialize)]
struct ReplayRecord {
    #[serde(default)]
    clock: Option<Clock>,
    #[serde(default)]
    output_module: String,
    /// Standard padded base64 of the raw map-output payload.
    #[serde(default)]
    payload: String,
    #[serde(default)]
    cursor: String,
    #[serde(default)]
    undo_last_valid_block: Option<u64>,
}

/// Replays a captured stream from a newline-delimited JSON file.
pub struct ReplayStream {
    path: PathBuf,
    reader: BufReader<std::fs::File>,
    line: usize,
}

impl ReplayStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path).map_err(|err| StreamError::Io {
            path: path.clone(),
            source: err,
        })?;

        Ok(ReplayStream {
            path,
            reader: BufReader::new(file),
            line: 0,
        })
    }

    /// Encodes one message as a replay line; the inverse of replaying.
    pub fn encode_record(message: &StreamMessage) -> serde_json::Result<String> {
        let record = match message {
            StreamMessage::BlockScopedData(data) => ReplayRecord {
                clock: Some(data.clock.clone()),
                output_module: data.output_module.clone(),
                payload: STANDARD.encode(&data.payload),
                cursor: data.cursor.clone(),
                undo_last_valid_block: None,
            },
            StreamMessage::Undo { last_valid_block } => ReplayRecord {
                clock: None,
                output_module: String::new(),
                payload: String::new(),
                cursor: String::new(),
                undo_last_valid_block: Some(*last_valid_block),
            },
        };
        serde_json::to_string(&record)
    }
}

#[async_trait]
impl BlockStream for ReplayStream {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, StreamError> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|err| StreamError::Io {
                    path: self.path.clone(),
                    source: err,
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            if line.trim().is_empty() {
                continue;
            }

            let record: ReplayRecord =
                serde_json::from_str(&line).map_err(|err| StreamError::Decode {
                    path: self.path.clone(),
                    line: self.line,
                    source: err,
                })?;

            if let Some(last_valid_block) = record.undo_last_valid_block {
                return Ok(Some(StreamMessage::Undo { last_valid_block }));
            }

            let clock = match record.clock {
                Some(clock) => clock,
                None => continue,
            };
            let payload = STANDARD
                .decode(&record.payload)
                .map_err(|err| StreamError::Payload {
                    path: self.path.clone(),
                    line: self.line,
                    source: err,
                })?;

            return Ok(Some(StreamMessage::BlockScopedData(BlockScopedData {
                clock,
                output_module: record.output_module,
                payload,
                cursor: record.cursor,
            })));
        }
    }
}

/// In-memory stream used by tests.
#[derive(Debug, Default)]
pub struct QueuedStream {
    messages: VecDeque<StreamMessage>,
}

impl QueuedStream {
    pub fn new(messages: impl IntoIterator<Item = StreamMessage>) -> Self {
        QueuedStream {
            messages: messages.into_iter().collect(),
        }
    }
}

#[async_trait]
impl BlockStream for QueuedStream {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, StreamError> {
        Ok(self.messages.pop_front())
    }
}
