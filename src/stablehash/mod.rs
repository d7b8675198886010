//! Deterministic, order-independent stable hashing over structured values.
//!
//! The digests produced here are compared across independent indexer
//! implementations as consensus-level values, so every rule in this module —
//! address derivation, leaf canonicalization, the unordered combine — is
//! pinned by reference vectors and must not drift.

mod address;
mod big_decimal;
mod fast_hasher;
mod fld;
mod impls;
mod u192;

pub use address::Address;
pub use big_decimal::{BigDecimal, BigDecimalError, MAX_SIGNIFICANT_DIGITS};
pub use fast_hasher::{FastHasher, InvalidHasherBytes, STATE_LEN};
pub use fld::{FldMix, InvalidMixerBytes};
pub use impls::Bytes;
pub use u192::{U192, U192Error};

/// A value that can be deterministically hashed at a field address.
pub trait StableHash {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H);
}

/// Accumulates stable-hash writes.
///
/// `new` exists on the trait because unordered containers hash every entry
/// through a fresh, independent hasher before depositing it into the parent.
pub trait StableHasher {
    fn new() -> Self;
    fn write(&mut self, addr: Address, bytes: &[u8]);
    fn mixin(&mut self, other: &Self);
    fn to_bytes(&self) -> [u8; STATE_LEN];
}

/// Hashes a single value from the root address with a fresh [`FastHasher`].
pub fn fast_hash<T: StableHash + ?Sized>(value: &T) -> u128 {
    let mut hasher = FastHasher::new();
    value.stable_hash(Address::root(), &mut hasher);
    hasher.finish()
}
