use super::BlockRange;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the staging writer.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("no active boundary to write into")]
    NoActiveBoundary,
    #[error("staging file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A boundary's worth of staged output, ready for upload.
#[derive(Debug)]
pub struct ClosedBoundary {
    /// Local staging file holding the boundary's bytes.
    pub path: PathBuf,
    /// Object name the boundary uploads under.
    pub name: String,
}

/// Buffered writer staging one boundary at a time in the working directory.
///
/// Bytes are buffered up to the configured size before hitting disk; the
/// file only leaves the working directory when the boundary closes and the
/// bundler hands it to an upload task.
pub struct StagingWriter {
    working_dir: PathBuf,
    buffer_size: usize,
    current: Option<OpenBoundary>,
}

struct OpenBoundary {
    range: BlockRange,
    file: BufWriter<File>,
    path: PathBuf,
}

impl StagingWriter {
    pub fn new(working_dir: impl Into<PathBuf>, buffer_size: usize) -> Result<Self, WriterError> {
        let working_dir = working_dir.into();
        std::fs::create_dir_all(&working_dir).map_err(|err| WriterError::Io {
            path: working_dir.clone(),
            source: err,
        })?;

        Ok(StagingWriter {
            working_dir,
            buffer_size,
            current: None,
        })
    }

    pub fn active_range(&self) -> Option<BlockRange> {
        self.current.as_ref().map(|open| open.range)
    }

    /// Opens a fresh staging file for `range`. Any previous boundary must
    /// have been closed first.
    pub fn open_boundary(&mut self, range: BlockRange) -> Result<(), WriterError> {
        debug_assert!(self.current.is_none(), "boundary already open");

        let path = self.staging_path(&range);
        let file = File::create(&path).map_err(|err| WriterError::Io {
            path: path.clone(),
            source: err,
        })?;

        self.current = Some(OpenBoundary {
            range,
            file: BufWriter::with_capacity(self.buffer_size, file),
            path,
        });
        Ok(())
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        let open = self.current.as_mut().ok_or(WriterError::NoActiveBoundary)?;
        open.file.write_all(bytes).map_err(|err| WriterError::Io {
            path: open.path.clone(),
            source: err,
        })
    }

    /// Flushes and closes the active boundary, returning its staged file.
    pub fn close_boundary(&mut self) -> Result<ClosedBoundary, WriterError> {
        let open = self.current.take().ok_or(WriterError::NoActiveBoundary)?;
        let path = open.path;

        let mut file = open.file.into_inner().map_err(|err| WriterError::Io {
            path: path.clone(),
            source: err.into_error(),
        })?;
        file.flush().map_err(|err| WriterError::Io {
            path: path.clone(),
            source: err,
        })?;

        Ok(ClosedBoundary {
            path,
            name: open.range.file_name(),
        })
    }

    fn staging_path(&self, range: &BlockRange) -> PathBuf {
        self.working_dir.join(format!("{}.staging", range.file_name()))
    }
}

/// Removes a staged file after its upload completed. A missing file is not
/// an error; shutdown paths may race with cleanup.
pub fn remove_staged(path: &Path) {
    let _ = std::fs::remove_file(path);
}
