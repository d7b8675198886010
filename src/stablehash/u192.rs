use num_bigint::BigUint;
use std::fmt;
use thiserror::Error;

/// Unsigned 192-bit integer stored as three little-endian 64-bit limbs.
///
/// All arithmetic is wrapping modulo 2^192, exactly as two's-complement
/// hardware would behave. This type exists solely to back [`FldMix`], the
/// order-independent combine of the stable hasher, so only the operations
/// that combine needs are provided.
///
/// [`FldMix`]: super::FldMix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct U192(pub [u64; 3]);

/// Errors surfaced when constructing a [`U192`] from foreign representations.
#[derive(Debug, Error)]
pub enum U192Error {
    #[error("invalid input {0:?}")]
    InvalidDigits(String),
    #[error("has {0} bits but U192 accepts a maximum of 192 bits")]
    Overflow(u64),
}

impl U192 {
    pub const ZERO: U192 = U192([0, 0, 0]);

    /// Maximum value, 6277101735386680763835789423207666416102355444464034512895.
    pub const MAX: U192 = U192([u64::MAX, u64::MAX, u64::MAX]);

    /// Parses a decimal string.
    pub fn from_dec_str(input: &str) -> Result<Self, U192Error> {
        let number = BigUint::parse_bytes(input.as_bytes(), 10)
            .ok_or_else(|| U192Error::InvalidDigits(input.to_string()))?;
        Self::from_biguint(&number)
    }

    /// Converts from an arbitrary-precision unsigned integer, rejecting
    /// values wider than 192 bits.
    pub fn from_biguint(number: &BigUint) -> Result<Self, U192Error> {
        let bit_count = number.bits();
        if bit_count > 192 {
            return Err(U192Error::Overflow(bit_count));
        }

        let mut limbs = [0u64; 3];
        for (index, digit) in number.iter_u64_digits().enumerate() {
            limbs[index] = digit;
        }
        Ok(U192(limbs))
    }

    pub fn wrapping_add(self, other: U192) -> U192 {
        let me = &self.0;
        let you = &other.0;

        let (r0, overflow0) = me[0].overflowing_add(you[0]);
        let (res, overflow1a) = me[1].overflowing_add(you[1]);
        let (r1, overflow1b) = res.overflowing_add(overflow0 as u64);

        let r2 = me[2]
            .wrapping_add(you[2])
            .wrapping_add(overflow1a as u64 + overflow1b as u64);

        U192([r0, r1, r2])
    }

    pub fn wrapping_sub(self, other: U192) -> U192 {
        let me = &self.0;
        let you = &other.0;

        let (r0, overflow0) = me[0].overflowing_sub(you[0]);
        let (res, overflow1a) = me[1].overflowing_sub(you[1]);
        let (r1, overflow1b) = res.overflowing_sub(overflow0 as u64);

        let r2 = me[2]
            .wrapping_sub(you[2])
            .wrapping_sub(overflow1a as u64 + overflow1b as u64);

        U192([r0, r1, r2])
    }

    pub fn wrapping_mul(self, other: U192) -> U192 {
        let me = &self.0;
        let you = &other.0;

        // Full 128-bit product of two limbs, split into (low, high) halves.
        let mult = |m: usize, y: usize| {
            let v = u128::from(me[m]) * u128::from(you[y]);
            (v as u64, (v >> 64) as u64)
        };

        let (r0, r1) = mult(0, 0);
        let (low, hi0) = mult(1, 0);
        let (r1, overflow0) = low.overflowing_add(r1);
        let (low, hi1) = mult(0, 1);
        let (r1, overflow1) = low.overflowing_add(r1);

        let r2 = (hi0 + overflow0 as u64)
            .wrapping_add(hi1 + overflow1 as u64)
            .wrapping_add(me[2].wrapping_mul(you[0]))
            .wrapping_add(me[1].wrapping_mul(you[1]))
            .wrapping_add(me[0].wrapping_mul(you[2]));

        U192([r0, r1, r2])
    }

    /// Serializes to 24 little-endian bytes.
    pub fn to_le_bytes(self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[0..8].copy_from_slice(&self.0[0].to_le_bytes());
        out[8..16].copy_from_slice(&self.0[1].to_le_bytes());
        out[16..24].copy_from_slice(&self.0[2].to_le_bytes());
        out
    }

    /// Deserializes from 24 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 24]) -> Self {
        let v0 = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let v1 = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let v2 = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        U192([v0, v1, v2])
    }

    fn as_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.to_le_bytes())
    }
}

impl fmt::Display for U192 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_biguint())
    }
}
