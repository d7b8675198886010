//! Streaming sink that consumes ordered block-scoped entity-change events
//! and produces per-entity JSONL bundles (later transformed into CSV files
//! for bulk loading into a relational subgraph store) together with a
//! cryptographically stable per-block proof-of-indexing digest that chains
//! through prior state.

pub mod app;
pub mod bundler;
pub mod client;
pub mod config;
pub mod csv;
pub mod entity;
pub mod observability;
pub mod poi;
pub mod schema;
pub mod sinker;
pub mod stablehash;
pub mod store;

pub use bundler::{
    boundaries_to_skip, compute_end_block, new_boundary, BlockRange, Bundler, BundlerError,
};
pub use client::{BlockScopedData, BlockStream, Clock, QueuedStream, ReplayStream, StreamMessage};
pub use config::{CsvConfig, SinkConfig};
pub use csv::{Entity, EntityTracker, Processor, RowEmit, TrackerError};
pub use entity::{EntityChange, EntityChangeAtBlockNum, FieldChange, Operation, Value};
pub use poi::ProofOfIndexing;
pub use schema::{
    entities_from_schema, entity_names_from_schema, normalize_entity_key, EntityDesc, FieldDesc,
    FieldType, POI_ENTITY_NAME,
};
pub use sinker::{EntitySink, SinkError};
pub use stablehash::{fast_hash, Address, BigDecimal, FastHasher, FldMix, StableHash, StableHasher, U192};
pub use store::{LocalFileStore, MemoryStore, ObjectStore, StoreError};
