//! Offline CSV transformation: reads one entity's bundled JSONL change
//! records and produces CSV files ready for bulk loading.

mod tracker;
mod writer;

pub use tracker::{Entity, EntityTracker, RowEmit, TrackerError};
pub use writer::{block_range_literal, format_field, CsvError, WriterManager};

use crate::config::CsvConfig;
use crate::entity::EntityChangeAtBlockNum;
use crate::schema::{self, EntityDesc};
use crate::store::{LocalFileStore, ObjectStore, StoreError};
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the CSV processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),
    #[error("cannot find entity {entity:?} in schema {path:?}")]
    UnknownEntity {
        entity: String,
        path: std::path::PathBuf,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no block range in filename: {0}")]
    MalformedFilename(String),
    #[error("broken file contiguity at {filename:?} (previous range end was {previous_end})")]
    BrokenContiguity {
        filename: String,
        previous_end: u64,
    },
    #[error("cannot find any entity bundle to load after walking {0} files")]
    NoBundles(usize),
    #[error("bundles do not cover the full range (last covered block {covered}, stop block {stop})")]
    IncompleteCoverage { covered: u64, stop: u64 },
    #[error("file {filename:?} line {line}: {source}")]
    MalformedLine {
        filename: String,
        line: usize,
        source: serde_json::Error,
    },
    #[error("file {filename:?} line {line}: {source}")]
    Lifecycle {
        filename: String,
        line: usize,
        source: TrackerError,
    },
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error("reading {filename:?}: {source}")]
    Read {
        filename: String,
        source: std::io::Error,
    },
}

/// Reads one entity's bundles in order and drives the tracker and the CSV
/// writer.
pub struct Processor {
    input_store: Arc<dyn ObjectStore>,
    output: WriterManager,
    tracker: EntityTracker,
    stop_block: u64,
}

impl Processor {
    pub fn new(config: &CsvConfig) -> Result<Self, ProcessorError> {
        config.validate()?;

        // The descriptor's name is the canonical key used for bundle
        // directories; accept the declared spelling as well.
        let desc = find_entity_desc(config)?;
        let entity = desc.name.clone();

        let input_base = LocalFileStore::new(&config.source_folder)?;
        let input_store = input_base.sub_store(&entity)?;

        let output_base = LocalFileStore::new(&config.dest_folder)?;
        let output_store = output_base.sub_store(&entity)?;

        let output = WriterManager::new(
            config.bundle_size,
            config.stop_block,
            output_store,
            desc.clone(),
        );

        Ok(Processor {
            input_store,
            output,
            tracker: EntityTracker::new(desc, config.strict),
            stop_block: config.stop_block,
        })
    }

    /// Wires a processor onto explicit stores; used by tests and by callers
    /// that do not read from the local filesystem.
    pub fn with_stores(
        config: &CsvConfig,
        desc: EntityDesc,
        input_store: Arc<dyn ObjectStore>,
        output_store: Arc<dyn ObjectStore>,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;

        let output = WriterManager::new(
            config.bundle_size,
            config.stop_block,
            output_store,
            desc.clone(),
        );

        Ok(Processor {
            input_store,
            output,
            tracker: EntityTracker::new(desc, config.strict),
            stop_block: config.stop_block,
        })
    }

    /// Processes every bundle file up to the stop block.
    pub fn run(&mut self) -> Result<(), ProcessorError> {
        let bundles = self.collect_bundles()?;
        tracing::info!(bundle_count = bundles.len(), "found entity bundles to export");

        for (index, filename) in bundles.iter().enumerate() {
            if self.process_bundle(filename)? {
                break;
            }

            if index % 10 == 0 {
                tracing::info!(filename = %filename, file_index = index, "entity bundle completed");
            }
        }

        // Whatever never closed is still valid at the stop block.
        for row in self.tracker.drain_open() {
            self.output.write(&row.entity, row.stop_block)?;
        }
        self.output.roll(self.stop_block)?;
        self.output.close()?;

        Ok(())
    }

    /// Lists bundle files, enforcing contiguity and full coverage of the
    /// range up to the stop block.
    fn collect_bundles(&self) -> Result<Vec<String>, ProcessorError> {
        let mut bundles = Vec::new();
        let mut end_range: Option<u64> = None;
        let mut seen = 0usize;

        for filename in self.input_store.list_objects()? {
            seen += 1;
            let (start_block, end_block) = parse_block_range(&filename)?;

            if start_block >= self.stop_block {
                break;
            }

            match end_range {
                None => end_range = Some(end_block),
                Some(previous_end) => {
                    if start_block != previous_end + 1 {
                        return Err(ProcessorError::BrokenContiguity {
                            filename,
                            previous_end,
                        });
                    }
                    end_range = Some(end_block);
                }
            }

            bundles.push(filename);
        }

        if bundles.is_empty() {
            return Err(ProcessorError::NoBundles(seen));
        }

        let covered = end_range.expect("bundles is non-empty");
        if covered + 1 < self.stop_block {
            return Err(ProcessorError::IncompleteCoverage {
                covered,
                stop: self.stop_block,
            });
        }

        Ok(bundles)
    }

    /// Streams one bundle's JSONL records. Returns `true` when the stop
    /// block was hit and processing is complete.
    fn process_bundle(&mut self, filename: &str) -> Result<bool, ProcessorError> {
        tracing::debug!(filename, "processing entity bundle");
        let reader = self.input_store.open_object(filename)?;

        for (line_index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| ProcessorError::Read {
                filename: filename.to_string(),
                source,
            })?;
            if line.is_empty() {
                continue;
            }

            let change: EntityChangeAtBlockNum =
                serde_json::from_str(&line).map_err(|source| ProcessorError::MalformedLine {
                    filename: filename.to_string(),
                    line: line_index + 1,
                    source,
                })?;

            if change.block_num > self.stop_block {
                tracing::info!(
                    block_num = change.block_num,
                    stop_block = self.stop_block,
                    "passed stop block"
                );
                return Ok(false);
            }

            if self.output.roll(change.block_num)? {
                return Ok(true);
            }

            let rows =
                self.tracker
                    .apply(&change)
                    .map_err(|source| ProcessorError::Lifecycle {
                        filename: filename.to_string(),
                        line: line_index + 1,
                        source,
                    })?;

            for row in rows {
                self.output.write(&row.entity, row.stop_block)?;
            }
        }

        Ok(false)
    }
}

fn find_entity_desc(config: &CsvConfig) -> Result<EntityDesc, ProcessorError> {
    let normalized = schema::normalize_entity_key(&config.entity);
    let entities = schema::entities_from_schema(&config.schema_path)?;
    entities
        .into_iter()
        .find(|desc| desc.name == config.entity || desc.name == normalized)
        .ok_or_else(|| ProcessorError::UnknownEntity {
            entity: config.entity.clone(),
            path: config.schema_path.clone(),
        })
}

/// Parses `NNNNNNNNNN-NNNNNNNNNN` bundle names into `(start, inclusive
/// end)`.
pub fn parse_block_range(filename: &str) -> Result<(u64, u64), ProcessorError> {
    let malformed = || ProcessorError::MalformedFilename(filename.to_string());

    let (start, end) = filename.split_once('-').ok_or_else(malformed)?;
    if start.len() != 10 || end.len() != 10 {
        return Err(malformed());
    }

    let start_block = start.parse::<u64>().map_err(|_| malformed())?;
    let end_block = end.parse::<u64>().map_err(|_| malformed())?;
    Ok((start_block, end_block))
}
