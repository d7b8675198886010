use super::tracker::Entity;
use crate::bundler::{new_boundary, BlockRange};
use crate::entity::Value;
use crate::schema::{EntityDesc, FieldDesc, FieldType};
use crate::store::{ObjectStore, StoreError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::Read;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use thiserror::Error;

/// Depth of the bounded pipe between the CSV writer and the uploader.
const PIPE_DEPTH: usize = 64;

/// Errors surfaced while writing CSV output.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("no active csv writer")]
    NoActiveWriter,
    #[error("field {field:?}: expected a {expected} value")]
    UnexpectedValue {
        field: String,
        expected: &'static str,
    },
    #[error("field {field:?}: invalid base64 bytes: {source}")]
    InvalidBytes {
        field: String,
        source: base64::DecodeError,
    },
    #[error("csv upload pipe closed early for {0:?}")]
    PipeClosed(String),
    #[error("upload of {name:?}: {source}")]
    Upload { name: String, source: StoreError },
    #[error("upload thread for {0:?} panicked")]
    UploadThread(String),
}

/// Rolls CSV output along bundle boundaries for one entity.
///
/// Unlike the sink's bundler, boundaries with no rows produce no file: the
/// writer jumps directly to the boundary containing the next row's block.
pub struct WriterManager {
    current: Option<CsvWriter>,
    current_range: Option<BlockRange>,
    stop_block: u64,
    bundle_size: u64,
    store: Arc<dyn ObjectStore>,
    desc: EntityDesc,
}

impl WriterManager {
    pub fn new(
        bundle_size: u64,
        stop_block: u64,
        store: Arc<dyn ObjectStore>,
        desc: EntityDesc,
    ) -> Self {
        WriterManager {
            current: None,
            current_range: None,
            stop_block,
            bundle_size,
            store,
            desc,
        }
    }

    /// Advances to the boundary containing `block` when needed. Returns
    /// `true` once `block` hits the stop block and processing is complete.
    pub fn roll(&mut self, block: u64) -> Result<bool, CsvError> {
        if self.current.is_none() {
            if block == self.stop_block {
                return Ok(false);
            }
            self.set_new_writer(block)?;
            return Ok(false);
        }

        if block == self.stop_block {
            // Caller closes afterwards.
            return Ok(true);
        }

        let range = self.current_range.expect("writer always carries its range");
        if !range.contains(block) {
            self.close_current()?;
            self.set_new_writer(block)?;
        }
        Ok(false)
    }

    /// Writes one row through the active writer.
    pub fn write(&mut self, entity: &Entity, stop_block: u64) -> Result<(), CsvError> {
        let writer = self.current.as_mut().ok_or(CsvError::NoActiveWriter)?;
        writer.write_row(entity, &self.desc, stop_block)
    }

    pub fn close(&mut self) -> Result<(), CsvError> {
        if self.current.is_some() {
            self.close_current()?;
        }
        Ok(())
    }

    fn close_current(&mut self) -> Result<(), CsvError> {
        let writer = self.current.take().ok_or(CsvError::NoActiveWriter)?;
        writer.close()
    }

    fn set_new_writer(&mut self, block: u64) -> Result<(), CsvError> {
        let mut next_range = match self.current_range {
            None => new_boundary(block, self.bundle_size),
            Some(mut range) => {
                while !range.contains(block) {
                    range = range.next(self.bundle_size);
                }
                range
            }
        };

        if next_range.contains(self.stop_block) {
            next_range = BlockRange::new(next_range.start, self.stop_block);
        }

        let mut writer = CsvWriter::new(Arc::clone(&self.store), next_range.file_name());
        writer.write_header(&self.desc)?;

        self.current = Some(writer);
        self.current_range = Some(next_range);
        Ok(())
    }
}

/// Streams one CSV file to the store through a bounded byte pipe, so the
/// writer back-pressures against the upload instead of buffering the file.
struct CsvWriter {
    name: String,
    sender: Option<SyncSender<Vec<u8>>>,
    uploader: Option<std::thread::JoinHandle<Result<(), CsvError>>>,
}

impl CsvWriter {
    fn new(store: Arc<dyn ObjectStore>, name: String) -> Self {
        let (sender, receiver) = sync_channel::<Vec<u8>>(PIPE_DEPTH);

        let upload_name = name.clone();
        let uploader = std::thread::spawn(move || {
            let mut reader = PipeReader {
                receiver,
                pending: Vec::new(),
                offset: 0,
            };
            store
                .write_object_stream(&upload_name, &mut reader)
                .map_err(|source| CsvError::Upload {
                    name: upload_name.clone(),
                    source,
                })
        });

        CsvWriter {
            name,
            sender: Some(sender),
            uploader: Some(uploader),
        }
    }

    fn write_header(&mut self, desc: &EntityDesc) -> Result<(), CsvError> {
        let mut records = vec!["id".to_string(), "block_range".to_string()];
        for field in desc.ordered_fields() {
            if field.name == "id" {
                continue;
            }
            records.push(field.name.clone());
        }
        self.write_record(&records)
    }

    fn write_row(
        &mut self,
        entity: &Entity,
        desc: &EntityDesc,
        stop_block: u64,
    ) -> Result<(), CsvError> {
        let id_desc = FieldDesc {
            name: "id".to_string(),
            field_type: FieldType::Id,
            nullable: false,
            array: false,
        };

        let mut records = vec![
            format_field(entity.fields.get("id"), &id_desc)?,
            block_range_literal(entity.start_block, stop_block),
        ];

        for field in desc.ordered_fields() {
            if field.name == "id" {
                continue;
            }
            records.push(format_field(entity.fields.get(&field.name), field)?);
        }

        self.write_record(&records)
    }

    fn write_record(&mut self, records: &[String]) -> Result<(), CsvError> {
        let mut line = String::new();
        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            push_quoted(&mut line, record);
        }
        line.push('\n');

        self.sender
            .as_ref()
            .expect("writer not closed")
            .send(line.into_bytes())
            .map_err(|_| CsvError::PipeClosed(self.name.clone()))
    }

    fn close(mut self) -> Result<(), CsvError> {
        // Dropping the sender ends the stream for the uploader.
        self.sender.take();
        let name = self.name.clone();
        match self.uploader.take().expect("writer not closed").join() {
            Ok(result) => result,
            Err(_) => Err(CsvError::UploadThread(name)),
        }
    }
}

struct PipeReader {
    receiver: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.offset >= self.pending.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let available = &self.pending[self.offset..];
        let take = available.len().min(buf.len());
        buf[..take].copy_from_slice(&available[..take]);
        self.offset += take;
        Ok(take)
    }
}

/// RFC 4180 quoting: a field is quoted only when it contains a comma,
/// quote, or line break; embedded quotes double.
fn push_quoted(line: &mut String, field: &str) {
    let needs_quotes = field.contains([',', '"', '\n', '\r']);
    if !needs_quotes {
        line.push_str(field);
        return;
    }

    line.push('"');
    for ch in field.chars() {
        if ch == '"' {
            line.push('"');
        }
        line.push(ch);
    }
    line.push('"');
}

/// Postgres range literal, open-ended when `stop` is zero.
pub fn block_range_literal(start: u64, stop: u64) -> String {
    if stop == 0 {
        format!("[{start},)")
    } else {
        format!("[{start},{stop})")
    }
}

/// Formats one field value per its descriptor. Missing nullable fields emit
/// the literal `NULL`; missing non-nullable fields fall back to the type's
/// zero value, which COPY will reject for forced columns.
pub fn format_field(value: Option<&Value>, desc: &FieldDesc) -> Result<String, CsvError> {
    let missing_default = || -> &'static str {
        if desc.nullable {
            return "NULL";
        }
        match desc.field_type {
            FieldType::Id | FieldType::String | FieldType::Bytes => "",
            FieldType::BigInt | FieldType::BigDecimal | FieldType::Int | FieldType::Float => "0",
            FieldType::Boolean => "false",
        }
    };

    let value = match value {
        None => return Ok(missing_default().to_string()),
        Some(value) => value,
    };

    if desc.array {
        let values = match value {
            Value::Array(values) => values,
            _ => {
                return Err(CsvError::UnexpectedValue {
                    field: desc.name.clone(),
                    expected: "array",
                })
            }
        };

        let mut elements = Vec::with_capacity(values.len());
        for element in values {
            elements.push(format_scalar(element, desc)?);
        }
        return Ok(to_escaped_array(&elements));
    }

    format_scalar(value, desc)
}

fn format_scalar(value: &Value, desc: &FieldDesc) -> Result<String, CsvError> {
    let unexpected = |expected: &'static str| CsvError::UnexpectedValue {
        field: desc.name.clone(),
        expected,
    };

    match desc.field_type {
        FieldType::Id | FieldType::String => match value {
            Value::String(v) => Ok(v.clone()),
            _ => Err(unexpected("string")),
        },
        FieldType::Bytes => match value {
            Value::Bytes(v) => {
                let decoded = STANDARD.decode(v).map_err(|source| CsvError::InvalidBytes {
                    field: desc.name.clone(),
                    source,
                })?;
                Ok(hex_lower(&decoded))
            }
            _ => Err(unexpected("bytes")),
        },
        FieldType::BigInt => match value {
            Value::BigInt(v) => Ok(v.clone()),
            _ => Err(unexpected("bigint")),
        },
        FieldType::BigDecimal => match value {
            Value::BigDecimal(v) => Ok(v.clone()),
            _ => Err(unexpected("bigdecimal")),
        },
        FieldType::Int => match value {
            Value::Int32(v) => Ok(v.to_string()),
            _ => Err(unexpected("int32")),
        },
        FieldType::Boolean => match value {
            Value::Bool(v) => Ok(v.to_string()),
            _ => Err(unexpected("bool")),
        },
        FieldType::Float => Err(unexpected("float (unsupported)")),
    }
}

/// Postgres array literal with commas and backslashes escaped by backslash.
fn to_escaped_array(elements: &[String]) -> String {
    let escaped: Vec<String> = elements
        .iter()
        .map(|element| element.replace('\\', "\\\\").replace(',', "\\,"))
        .collect();
    format!("{{{}}}", escaped.join(","))
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
