use serde::Serialize;
use thiserror::Error;

/// Errors surfaced while encoding a bundle record.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("json marshal: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes one record as a newline-terminated JSON line.
pub fn jsonl_encode<T: Serialize>(record: &T) -> Result<Vec<u8>, EncodeError> {
    let mut buf = serde_json::to_vec(record)?;
    buf.push(b'\n');
    Ok(buf)
}
