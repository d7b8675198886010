//! Proof of indexing: a per-block stream of entity events hashed under a
//! fixed field-address schema, whose paused 32-byte state chains through the
//! previous block's digest.

mod event;

pub use event::{RemoveEntity, SetEntity};

use crate::entity::EntityChange;
use crate::stablehash::{Address, FastHasher, InvalidHasherBytes, StableHash, StableHasher, STATE_LEN};
use thiserror::Error;

/// Errors surfaced while pausing a proof of indexing.
#[derive(Debug, Error)]
pub enum PoiError {
    #[error("invalid previous proof-of-indexing state: {0}")]
    InvalidPreviousState(#[from] InvalidHasherBytes),
}

/// Per-block proof-of-indexing builder.
///
/// Events land at `root → 1 → 0 → block → 0 → index`, mirroring the
/// reference indexer's causality-region layout, and [`pause`] terminates the
/// block by writing the event count at the vector's own address.
///
/// [`pause`]: ProofOfIndexing::pause
pub struct ProofOfIndexing {
    block_number: u64,
    vec_length: u64,
    hasher: FastHasher,
}

impl ProofOfIndexing {
    pub fn new(block_number: u64) -> Self {
        ProofOfIndexing {
            block_number,
            vec_length: 0,
            hasher: FastHasher::new(),
        }
    }

    /// Records a SetEntity event for a create, update, or final operation.
    pub fn set_entity(&mut self, change: &EntityChange) {
        self.write_event(&SetEntity::new(change));
    }

    /// Records a RemoveEntity event for a delete operation.
    pub fn remove_entity(&mut self, change: &EntityChange) {
        self.write_event(&RemoveEntity::new(change));
    }

    fn write_event<T: StableHash>(&mut self, event: &T) {
        event.stable_hash(self.event_address().child(self.vec_length), &mut self.hasher);
        self.vec_length += 1;
    }

    // kvp value → causality-region blocks vector → this block → its events.
    fn event_address(&self) -> Address {
        Address::root()
            .child(1)
            .child(0)
            .child(self.block_number)
            .child(0)
    }

    /// Terminates the block's contribution: writes the event count at the
    /// event vector's address, mixes in the previous paused digest when one
    /// exists, and returns the serialized state.
    pub fn pause(mut self, prev: Option<&[u8]>) -> Result<[u8; STATE_LEN], PoiError> {
        let addr = self.event_address();
        self.vec_length.stable_hash(addr, &mut self.hasher);

        if let Some(prev) = prev.filter(|prev| !prev.is_empty()) {
            let prev_hasher = FastHasher::from_bytes(prev)?;
            self.hasher.mixin(&prev_hasher);
        }

        Ok(self.hasher.to_bytes())
    }

    /// Current serialized state, without pausing. Useful for debugging and
    /// for asserting reference vectors mid-block.
    pub fn current_bytes(&self) -> [u8; STATE_LEN] {
        self.hasher.to_bytes()
    }
}
