//! Fixed-size block-range bundling: per-entity output is grouped into
//! half-open boundaries, staged locally, and uploaded in the background when
//! a boundary closes. Every boundary between the start block and the stop
//! block materializes exactly one object, empty boundaries included.

mod encoder;
mod writer;

pub use encoder::{jsonl_encode, EncodeError};
pub use writer::{ClosedBoundary, StagingWriter, WriterError};

use crate::store::{ObjectStore, StoreError};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Half-open block range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end_exclusive: u64,
}

impl BlockRange {
    pub fn new(start: u64, end_exclusive: u64) -> Self {
        BlockRange {
            start,
            end_exclusive,
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.start && block < self.end_exclusive
    }

    pub fn next(&self, size: u64) -> BlockRange {
        BlockRange::new(self.end_exclusive, self.end_exclusive + size)
    }

    /// Object name for this boundary: ten-digit zero-padded start and
    /// inclusive end.
    pub fn file_name(&self) -> String {
        format!("{:010}-{:010}", self.start, self.end_exclusive - 1)
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end_exclusive)
    }
}

/// Boundary containing `block` for the given bundle size.
pub fn new_boundary(block: u64, size: u64) -> BlockRange {
    let start = block - block % size;
    BlockRange::new(start, start + size)
}

/// Rounds `start` up to the end of its bundle.
pub fn compute_end_block(start: u64, size: u64) -> u64 {
    start + size - start % size
}

/// Boundaries with no data between the last active boundary (exclusive) and
/// the boundary containing `block` (exclusive), in order.
pub fn boundaries_to_skip(last_active: &BlockRange, block: u64, size: u64) -> Vec<BlockRange> {
    let target_start = block - block % size;
    let mut out = Vec::new();
    let mut next_start = last_active.end_exclusive;

    while next_start + size <= target_start {
        out.push(BlockRange::new(next_start, next_start + size));
        next_start += size;
    }

    out
}

/// Errors surfaced by the bundler.
#[derive(Debug, Error)]
pub enum BundlerError {
    /// Not a failure: the roll crossed the stop block and the caller should
    /// begin a graceful shutdown.
    #[error("stop block reached")]
    StopBlockReached,
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error("upload of {name:?}: {source}")]
    Upload { name: String, source: StoreError },
    #[error("upload task for {0:?} panicked")]
    UploadTask(String),
    #[error("staged file {path:?}: {source}")]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-entity bundler.
///
/// Writes go to a buffered staging file for the active boundary; `roll`
/// closes the boundary when a block falls outside it, hands the staged file
/// to a background upload, and emits empty objects for any boundary the
/// stream skipped entirely. At most one upload is in flight; rolling into
/// the next boundary awaits the previous upload first.
pub struct Bundler {
    size: u64,
    stop_block: u64,
    store: Arc<dyn ObjectStore>,
    writer: StagingWriter,
    in_flight: Option<(String, JoinHandle<Result<(), BundlerError>>)>,
    last_emitted_end: u64,
}

impl Bundler {
    pub fn new(
        size: u64,
        stop_block: u64,
        store: Arc<dyn ObjectStore>,
        working_dir: impl Into<PathBuf>,
        buffer_size: usize,
    ) -> Result<Self, BundlerError> {
        Ok(Bundler {
            size,
            stop_block,
            store,
            writer: StagingWriter::new(working_dir, buffer_size)?,
            in_flight: None,
            last_emitted_end: 0,
        })
    }

    /// Opens the first boundary, the one containing `block`.
    pub fn start(&mut self, block: u64) -> Result<(), BundlerError> {
        let range = self.capped(new_boundary(block, self.size));
        self.writer.open_boundary(range)?;
        Ok(())
    }

    /// Appends bytes to the active boundary's staging file.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BundlerError> {
        Ok(self.writer.write(bytes)?)
    }

    /// Advances to the boundary containing `block`, closing and uploading
    /// the active one and materializing empty objects for skipped
    /// boundaries. Returns [`BundlerError::StopBlockReached`] once `block`
    /// is at or past the stop block.
    pub async fn roll(&mut self, block: u64) -> Result<(), BundlerError> {
        // Rolling past the stop block behaves exactly like rolling to it.
        let block = block.min(self.stop_block);

        let active = match self.writer.active_range() {
            Some(range) => range,
            None => return Ok(()),
        };
        if active.contains(block) {
            return Ok(());
        }

        self.close_and_upload().await?;

        for skipped in boundaries_to_skip(&active, block, self.size) {
            self.writer.open_boundary(self.capped(skipped))?;
            self.close_and_upload().await?;
        }

        if block >= self.stop_block {
            self.materialize_trailing_boundary().await?;
            return Err(BundlerError::StopBlockReached);
        }

        self.writer
            .open_boundary(self.capped(new_boundary(block, self.size)))?;
        Ok(())
    }

    /// Flushes the active boundary, if any, and drains the pending upload.
    pub async fn shutdown(&mut self) -> Result<(), BundlerError> {
        if self.writer.active_range().is_some() {
            self.close_and_upload().await?;
        }
        self.await_in_flight().await
    }

    fn capped(&self, range: BlockRange) -> BlockRange {
        if range.contains(self.stop_block) {
            BlockRange::new(range.start, self.stop_block)
        } else {
            range
        }
    }

    /// The boundary holding `stop_block - 1` when the stream never produced
    /// a block inside it; keeps the invariant that every boundary up to the
    /// stop block has exactly one object.
    async fn materialize_trailing_boundary(&mut self) -> Result<(), BundlerError> {
        if self.stop_block == 0 {
            return Ok(());
        }
        let trailing = self.capped(new_boundary(self.stop_block - 1, self.size));
        if trailing.start < self.last_emitted_end {
            return Ok(());
        }

        self.writer.open_boundary(trailing)?;
        self.close_and_upload().await
    }

    async fn close_and_upload(&mut self) -> Result<(), BundlerError> {
        let range = self
            .writer
            .active_range()
            .expect("close_and_upload requires an active boundary");
        let closed = self.writer.close_boundary()?;

        self.await_in_flight().await?;

        let store = Arc::clone(&self.store);
        let name = closed.name.clone();
        let handle = tokio::task::spawn_blocking(move || upload_boundary(&*store, closed));
        self.in_flight = Some((name, handle));
        self.last_emitted_end = range.end_exclusive;

        Ok(())
    }

    async fn await_in_flight(&mut self) -> Result<(), BundlerError> {
        if let Some((name, handle)) = self.in_flight.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_) => return Err(BundlerError::UploadTask(name)),
            }
        }
        Ok(())
    }
}

fn upload_boundary(store: &dyn ObjectStore, closed: ClosedBoundary) -> Result<(), BundlerError> {
    let content = std::fs::read(&closed.path).map_err(|err| BundlerError::Staging {
        path: closed.path.clone(),
        source: err,
    })?;

    store
        .write_object(&closed.name, &content)
        .map_err(|err| BundlerError::Upload {
            name: closed.name.clone(),
            source: err,
        })?;

    writer::remove_staged(&closed.path);
    Ok(())
}
