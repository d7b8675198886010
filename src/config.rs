use std::path::PathBuf;
use thiserror::Error;

/// Default bundle size, in blocks.
pub const DEFAULT_BUNDLE_SIZE: u64 = 1000;
/// Default staging buffer size, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 10 * 1024;

/// Errors surfaced while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bundle size must be greater than zero")]
    ZeroBundleSize,
    #[error("stop block must be greater than zero")]
    ZeroStopBlock,
    #[error("stop block {stop} must be greater than start block {start}")]
    EmptyRange { start: u64, stop: u64 },
}

/// Configuration of the sink (`run`).
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Destination the bundles upload to.
    pub dest_folder: PathBuf,
    /// Local staging directory; each entity gets a private subdirectory.
    pub working_dir: PathBuf,
    /// Name of the module whose output the sink consumes.
    pub output_module: String,
    pub start_block: u64,
    pub stop_block: u64,
    pub bundle_size: u64,
    pub buffer_size: usize,
    /// Chain id recorded as the proof-of-indexing row id.
    pub chain_id: String,
    /// Previously paused digest to chain from, if resuming mid-chain.
    pub start_poi: Option<Vec<u8>>,
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range(self.bundle_size, self.start_block, self.stop_block)
    }
}

/// Configuration of the offline CSV transformer (`tocsv`).
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Folder containing one subdirectory of JSONL bundles per entity.
    pub source_folder: PathBuf,
    /// Folder the CSV files are written under, per entity.
    pub dest_folder: PathBuf,
    /// Canonical entity key to process.
    pub entity: String,
    /// Path to the GraphQL schema describing the entity.
    pub schema_path: PathBuf,
    pub stop_block: u64,
    pub bundle_size: u64,
    /// When set, an UPDATE for an id that was never seen is an error
    /// instead of being treated as a first sighting.
    pub strict: bool,
}

impl CsvConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range(self.bundle_size, 0, self.stop_block)
    }
}

fn validate_range(bundle_size: u64, start: u64, stop: u64) -> Result<(), ConfigError> {
    if bundle_size == 0 {
        return Err(ConfigError::ZeroBundleSize);
    }
    if stop == 0 {
        return Err(ConfigError::ZeroStopBlock);
    }
    if stop <= start {
        return Err(ConfigError::EmptyRange { start, stop });
    }
    Ok(())
}
