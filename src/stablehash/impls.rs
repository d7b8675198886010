use super::{Address, StableHash, StableHasher};
use num_bigint::{BigInt, Sign};
use std::collections::{BTreeMap, HashMap};

/// Byte-string wrapper.
///
/// Distinct from `[u8]` on purpose: a plain `Vec<u8>` hashes as an ordered
/// list of integers through the generic slice impl, while `Bytes` hashes the
/// raw bytes as a single leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bytes<'a>(pub &'a [u8]);

impl StableHash for Bytes<'_> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        if !self.0.is_empty() {
            state.write(addr, self.0);
        }
    }
}

impl StableHash for str {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        Bytes(self.as_bytes()).stable_hash(addr, state);
    }
}

impl StableHash for String {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        self.as_str().stable_hash(addr, state);
    }
}

impl<T: StableHash + ?Sized> StableHash for &T {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        (**self).stable_hash(addr, state);
    }
}

/// Canonical integer rule: an optional empty write at `child(0)` tags the
/// sign, then the little-endian magnitude with trailing zero bytes trimmed
/// is written if anything remains. Zero writes nothing at all.
///
/// Keeping the sign as a child makes it possible to widen a schema from
/// `u32` to `i64` without changing existing hashes, and also permits a
/// negative zero for types that carry one.
fn stable_hash_int<H: StableHasher>(negative: bool, le_bytes: &[u8], addr: Address, state: &mut H) {
    if negative {
        state.write(addr.child(0), &[]);
    }

    let canonical = trim_zeros(le_bytes);
    if !canonical.is_empty() {
        state.write(addr, canonical);
    }
}

fn trim_zeros(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end != 0 && bytes[end - 1] == 0 {
        end -= 1;
    }
    &bytes[..end]
}

macro_rules! impl_stable_hash_unsigned {
    ($($t:ty),*) => {
        $(
            impl StableHash for $t {
                fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
                    stable_hash_int(false, &self.to_le_bytes(), addr, state);
                }
            }
        )*
    };
}

macro_rules! impl_stable_hash_signed {
    ($($t:ty),*) => {
        $(
            impl StableHash for $t {
                fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
                    stable_hash_int(*self < 0, &self.unsigned_abs().to_le_bytes(), addr, state);
                }
            }
        )*
    };
}

impl_stable_hash_unsigned!(u8, u16, u32, u64);
impl_stable_hash_signed!(i8, i16, i32, i64);

impl StableHash for bool {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        state.write(addr, &[*self as u8]);
    }
}

impl<T: StableHash> StableHash for Option<T> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        // None writes nothing, so a newly added optional field hashes the
        // same as no field at all.
        if let Some(value) = self {
            value.stable_hash(addr.child(0), state);
            state.write(addr, &[]);
        }
    }
}

impl<T: StableHash> StableHash for [T] {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        for (index, member) in self.iter().enumerate() {
            member.stable_hash(addr.child(index as u64), state);
        }
        (self.len() as u64).stable_hash(addr, state);
    }
}

impl<T: StableHash> StableHash for Vec<T> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        self.as_slice().stable_hash(addr, state);
    }
}

fn stable_hash_map_entry<K, V, H>(key: &K, value: &V, addr: Address, state: &mut H)
where
    K: StableHash,
    V: StableHash,
    H: StableHasher,
{
    // Each entry goes through an independent hasher to break the
    // relationship between field addresses of different entries; the
    // order-independent combine then makes iteration order irrelevant.
    let mut entry_hasher = H::new();
    let (a, b) = addr.unordered();

    key.stable_hash(a.child(0), &mut entry_hasher);
    value.stable_hash(a.child(1), &mut entry_hasher);

    state.write(b, &entry_hasher.to_bytes());
}

impl<K: StableHash, V: StableHash, S> StableHash for HashMap<K, V, S> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        for (key, value) in self {
            stable_hash_map_entry(key, value, addr, state);
        }
    }
}

impl<K: StableHash, V: StableHash> StableHash for BTreeMap<K, V> {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        for (key, value) in self {
            stable_hash_map_entry(key, value, addr, state);
        }
    }
}

impl StableHash for BigInt {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        let (sign, magnitude) = self.to_bytes_le();
        stable_hash_int(sign == Sign::Minus, &magnitude, addr, state);
    }
}
