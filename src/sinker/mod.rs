//! Sink controller: drives the per-entity bundlers and the proof-of-indexing
//! chain from an ordered stream of block-scoped messages.

mod stats;

pub use stats::Stats;

use crate::bundler::{jsonl_encode, Bundler, BundlerError, EncodeError};
use crate::client::{BlockScopedData, BlockStream, StreamError, StreamMessage};
use crate::config::SinkConfig;
use crate::entity::{
    pb, EntityChange, EntityChangeAtBlockNum, EntityError, FieldChange, Operation, Value,
};
use crate::poi::{PoiError, ProofOfIndexing};
use crate::schema::{normalize_entity_key, POI_ENTITY_NAME};
use crate::store::{ObjectStore, StoreError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use prost::Message as _;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long shutdown waits for bundler uploads to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Sidecar object recording the last processed block.
const LAST_BLOCK_SIDECAR: &str = "last_block.txt";

/// Errors surfaced by the sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(
        "received data from wrong output module, expected from {expected:?} but got {actual:?}"
    )]
    WrongOutputModule { expected: String, actual: String },
    #[error("received undo signal: substreams connection should be final-blocks-only")]
    UndoSignal,
    #[error("block {block} is lower than previously handled block {last}")]
    NonMonotonicBlock { block: u64, last: u64 },
    #[error("unmarshal entity changes at block {block}: {source}")]
    Decode {
        block: u64,
        source: prost::DecodeError,
    },
    #[error("invalid entity change at block {block}: {source}")]
    InvalidChange { block: u64, source: EntityError },
    #[error(
        "received operation {operation:?} for entity {entity:?} which should never be sent"
    )]
    UnspecifiedOperation { entity: String, operation: Operation },
    #[error("cannot get bundler for entity {0:?}")]
    UnknownEntity(String),
    #[error(transparent)]
    Bundler(#[from] BundlerError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("pause proof of indexing: {0}")]
    Poi(#[from] PoiError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bundler shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

/// The per-entity fan-out plus the POI chain, fed one block at a time.
pub struct EntitySink {
    bundlers: HashMap<String, Bundler>,
    poi_bundler: Bundler,
    output_module: String,
    stop_block: u64,
    chain_id: String,
    last_poi: Option<Vec<u8>>,
    last_block: Option<u64>,
    dest_store: Arc<dyn ObjectStore>,
    stats: Stats,
}

impl EntitySink {
    /// Builds one bundler per entity plus the POI bundler, each rooted in a
    /// private destination sub-store and working subdirectory, and opens
    /// their first boundary at the configured start block.
    pub fn new(
        config: &SinkConfig,
        entities: &[String],
        dest_store: Arc<dyn ObjectStore>,
    ) -> Result<Self, SinkError> {
        let mut bundlers = HashMap::new();
        for entity in entities {
            let key = normalize_entity_key(entity);
            let bundler = Self::bundler_for(config, &key, &dest_store)?;
            bundlers.insert(key, bundler);
        }

        let poi_bundler = Self::bundler_for(config, POI_ENTITY_NAME, &dest_store)?;

        Ok(EntitySink {
            bundlers,
            poi_bundler,
            output_module: config.output_module.clone(),
            stop_block: config.stop_block,
            chain_id: config.chain_id.clone(),
            last_poi: config.start_poi.clone(),
            last_block: None,
            dest_store,
            stats: Stats::default(),
        })
    }

    fn bundler_for(
        config: &SinkConfig,
        entity: &str,
        dest_store: &Arc<dyn ObjectStore>,
    ) -> Result<Bundler, SinkError> {
        let sub_store = dest_store.sub_store(entity)?;
        let mut bundler = Bundler::new(
            config.bundle_size,
            config.stop_block,
            sub_store,
            config.working_dir.join(entity),
            config.buffer_size,
        )?;
        bundler.start(config.start_block)?;
        Ok(bundler)
    }

    /// Consumes the stream until the stop block, an undo signal, or an
    /// error. On the graceful path the final boundary rolls to the stop
    /// block, the `last_block.txt` sidecar is written, and every bundler
    /// drains its uploads.
    pub async fn run(&mut self, stream: &mut dyn BlockStream) -> Result<(), SinkError> {
        loop {
            let message = match stream.next_message().await {
                Ok(Some(message)) => message,
                // Stream exhausted: everything delivered was final, finish
                // the range.
                Ok(None) => break,
                Err(err) => {
                    self.abort().await;
                    return Err(err.into());
                }
            };

            let data = match message {
                StreamMessage::BlockScopedData(data) => data,
                StreamMessage::Undo { .. } => {
                    self.abort().await;
                    return Err(SinkError::UndoSignal);
                }
            };

            if data.clock.number >= self.stop_block {
                break;
            }

            match self.handle_block_data(&data).await {
                Ok(()) => {}
                Err(SinkError::Bundler(BundlerError::StopBlockReached)) => break,
                Err(err) => {
                    self.abort().await;
                    return Err(err);
                }
            }

            self.stats.maybe_log();
        }

        self.finish().await
    }

    /// Processes one block: rolls every bundler to the block, JSONL-encodes
    /// each change into its entity's bundler, feeds the change into the POI
    /// builder, then pauses the POI against the previous digest and records
    /// a `poi2$` row whenever the digest moved.
    pub async fn handle_block_data(&mut self, data: &BlockScopedData) -> Result<(), SinkError> {
        if data.output_module != self.output_module {
            return Err(SinkError::WrongOutputModule {
                expected: self.output_module.clone(),
                actual: data.output_module.clone(),
            });
        }

        let block_num = data.clock.number;
        if let Some(last) = self.last_block {
            if block_num < last {
                return Err(SinkError::NonMonotonicBlock {
                    block: block_num,
                    last,
                });
            }
        }

        let changes = pb::EntityChanges::decode(data.payload.as_slice()).map_err(|source| {
            SinkError::Decode {
                block: block_num,
                source,
            }
        })?;

        self.roll_all(block_num).await?;

        let mut proof_of_indexing = ProofOfIndexing::new(block_num);

        for change in changes.entity_changes {
            let change: EntityChange =
                change
                    .try_into()
                    .map_err(|source| SinkError::InvalidChange {
                        block: block_num,
                        source,
                    })?;

            let line = jsonl_encode(&EntityChangeAtBlockNum {
                entity_change: change.clone(),
                block_num,
            })?;

            let key = normalize_entity_key(&change.entity);
            let bundler = self
                .bundlers
                .get_mut(&key)
                .ok_or_else(|| SinkError::UnknownEntity(key.clone()))?;
            bundler.write(&line)?;

            match change.operation {
                Operation::Create | Operation::Update | Operation::Final => {
                    proof_of_indexing.set_entity(&change);
                }
                Operation::Delete => proof_of_indexing.remove_entity(&change),
                Operation::Unspecified => {
                    return Err(SinkError::UnspecifiedOperation {
                        entity: change.entity,
                        operation: change.operation,
                    });
                }
            }
        }

        let digest = proof_of_indexing.pause(self.last_poi.as_deref())?;

        if self.last_poi.as_deref() != Some(&digest[..]) {
            let row = poi_entity_change(&digest, &self.chain_id, block_num);
            self.poi_bundler.write(&jsonl_encode(&row)?)?;
            self.last_poi = Some(digest.to_vec());
        }

        self.last_block = Some(block_num);
        self.stats.record_block(block_num, &data.clock.id);

        Ok(())
    }

    async fn roll_all(&mut self, block_num: u64) -> Result<(), SinkError> {
        let mut stop_reached = false;

        for bundler in self.bundlers.values_mut() {
            match bundler.roll(block_num).await {
                Ok(()) => {}
                Err(BundlerError::StopBlockReached) => stop_reached = true,
                Err(err) => return Err(err.into()),
            }
        }
        match self.poi_bundler.roll(block_num).await {
            Ok(()) => {}
            Err(BundlerError::StopBlockReached) => stop_reached = true,
            Err(err) => return Err(err.into()),
        }

        if stop_reached {
            return Err(BundlerError::StopBlockReached.into());
        }
        Ok(())
    }

    /// Graceful completion: roll everything to the stop block, write the
    /// sidecar, and drain all bundlers in parallel.
    async fn finish(&mut self) -> Result<(), SinkError> {
        self.stats.log_now();
        tracing::info!(
            last_block_written = self.stats.last_block(),
            "csv sinker terminating"
        );

        match self.roll_all(self.stop_block).await {
            Ok(()) | Err(SinkError::Bundler(BundlerError::StopBlockReached)) => {}
            Err(err) => {
                self.abort().await;
                return Err(err);
            }
        }

        self.write_sidecar()?;
        self.close_all_bundlers().await
    }

    fn write_sidecar(&self) -> Result<(), SinkError> {
        let content = format!(
            "{}:{}\n",
            self.stats.last_block(),
            self.stats.last_block_hash()
        );
        if let Err(err) = self
            .dest_store
            .write_object(LAST_BLOCK_SIDECAR, content.as_bytes())
        {
            tracing::warn!(error = %err, "could not write last block");
        }
        Ok(())
    }

    async fn close_all_bundlers(&mut self) -> Result<(), SinkError> {
        let mut handles = Vec::with_capacity(self.bundlers.len() + 1);
        for (entity, mut bundler) in self.bundlers.drain() {
            handles.push(tokio::spawn(async move {
                bundler.shutdown().await.map_err(|err| (entity, err))
            }));
        }

        let poi_result = self.poi_bundler.shutdown().await;

        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            let mut first_error = None;
            for handle in handles {
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err((entity, err))) => {
                        tracing::error!(entity = %entity, error = %err, "bundler shutdown failed");
                        first_error.get_or_insert(err);
                    }
                    Err(_) => tracing::error!("bundler shutdown task panicked"),
                }
            }
            first_error
        })
        .await;

        match drained {
            Ok(Some(err)) => Err(err.into()),
            Ok(None) => Ok(poi_result.map_err(SinkError::Bundler)?),
            Err(_) => Err(SinkError::ShutdownTimeout(SHUTDOWN_TIMEOUT)),
        }
    }

    /// Error-path teardown: flush what we can, drop pending work.
    async fn abort(&mut self) {
        for (entity, mut bundler) in self.bundlers.drain() {
            if let Err(err) = bundler.shutdown().await {
                tracing::warn!(entity = %entity, error = %err, "bundler abort flush failed");
            }
        }
        if let Err(err) = self.poi_bundler.shutdown().await {
            tracing::warn!(error = %err, "poi bundler abort flush failed");
        }
    }
}

/// The `poi2$` row recorded whenever a block's paused digest differs from
/// the previous one.
fn poi_entity_change(digest: &[u8], chain_id: &str, block_num: u64) -> EntityChangeAtBlockNum {
    EntityChangeAtBlockNum {
        block_num,
        entity_change: EntityChange {
            entity: POI_ENTITY_NAME.to_string(),
            id: chain_id.to_string(),
            operation: Operation::Update,
            fields: vec![FieldChange {
                name: "digest".to_string(),
                new_value: Value::Bytes(STANDARD.encode(digest)),
            }],
        },
    }
}
