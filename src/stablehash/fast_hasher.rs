use super::address::Address;
use super::fld::FldMix;
use super::StableHasher;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_128_with_seed;

/// Serialized size of a paused hasher: 24 mixer bytes plus the write count.
pub const STATE_LEN: usize = 32;

/// Error surfaced when rehydrating a hasher from serialized state.
#[derive(Debug, Error)]
#[error("accepting exactly {STATE_LEN} bytes, got {0}")]
pub struct InvalidHasherBytes(pub usize);

/// 128-bit seeded XXH3 hasher with an order-independent combine.
///
/// Every `write` hashes the bytes seeded by the low half of the field
/// address and feeds the result into the [`FldMix`] combine together with
/// the address' high half, so the set of writes — not their order —
/// determines the state. The 32-byte serialized form is the unit the proof
/// of indexing chains across blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastHasher {
    mixer: FldMix,
    count: u64,
}

impl FastHasher {
    pub fn new() -> Self {
        FastHasher {
            mixer: FldMix::new(),
            count: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidHasherBytes> {
        if bytes.len() != STATE_LEN {
            return Err(InvalidHasherBytes(bytes.len()));
        }

        let mixer = FldMix::from_bytes(&bytes[0..24]).map_err(|_| InvalidHasherBytes(bytes.len()))?;
        let count = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        Ok(FastHasher { mixer, count })
    }

    /// Finalizes into a 128-bit digest of the serialized state, seeded by
    /// the write count.
    pub fn finish(&self) -> u128 {
        xxh3_128_with_seed(&self.to_bytes(), self.count)
    }
}

impl StableHasher for FastHasher {
    fn new() -> Self {
        FastHasher::new()
    }

    fn write(&mut self, addr: Address, bytes: &[u8]) {
        let (low, high) = addr.low_high();
        let hash = xxh3_128_with_seed(bytes, low);
        self.mixer.mix(hash, high);
        self.count = self.count.wrapping_add(1);
    }

    fn mixin(&mut self, other: &Self) {
        self.mixer.mixin(&other.mixer);
        self.count = self.count.wrapping_add(other.count);
    }

    fn to_bytes(&self) -> [u8; STATE_LEN] {
        let mut out = [0u8; STATE_LEN];
        out[0..24].copy_from_slice(&self.mixer.to_bytes());
        out[24..32].copy_from_slice(&self.count.to_le_bytes());
        out
    }
}

impl Default for FastHasher {
    fn default() -> Self {
        Self::new()
    }
}
