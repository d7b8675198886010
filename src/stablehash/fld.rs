use super::u192::U192;
use thiserror::Error;

/// Order-independent, collision-resistant combine over 192-bit state.
///
/// The update function `u(x, y) = P + Q·(x + y) + R·(x·y)` (wrapping mod
/// 2^192) is symmetric in its arguments and compatible with itself, so
/// mixing values in any order produces the same state and two mixers can be
/// merged associatively. This is what makes map and set hashing independent
/// of iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FldMix(U192);

const P: U192 = U192([2305843009213693959, 2305843009213693950, 0]);
const Q: U192 = U192([18446744073709551609, 0, 0]);
const R: U192 = U192([8, 0, 0]);
const I: U192 = U192([16140901064495857665, u64::MAX, u64::MAX]);

/// Error surfaced when rehydrating a mixer from serialized bytes.
#[derive(Debug, Error)]
#[error("accepting exactly 24 bytes, got {0}")]
pub struct InvalidMixerBytes(pub usize);

impl FldMix {
    pub fn new() -> Self {
        FldMix(I)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidMixerBytes> {
        let bytes: [u8; 24] = bytes
            .try_into()
            .map_err(|_| InvalidMixerBytes(bytes.len()))?;
        Ok(FldMix(U192::from_le_bytes(bytes)))
    }

    pub fn to_bytes(&self) -> [u8; 24] {
        self.0.to_le_bytes()
    }

    pub fn mix(&mut self, value: u128, seed: u64) {
        // The seed's most significant bit is cleared so the three limbs of
        // the mixed value never collide with the identity element.
        let v0 = seed & (u64::MAX >> 1);
        let v1 = value as u64;
        let v2 = (value >> 64) as u64;

        self.0 = Self::u(self.0, U192([v0, v1, v2]));
    }

    pub fn mixin(&mut self, other: &FldMix) {
        self.0 = Self::u(self.0, other.0);
    }

    fn u(x: U192, y: U192) -> U192 {
        let q_mul_x_plus_y = Q.wrapping_mul(x.wrapping_add(y));
        let r_mul_x_mul_y = R.wrapping_mul(x.wrapping_mul(y));

        P.wrapping_add(q_mul_x_plus_y.wrapping_add(r_mul_x_mul_y))
    }
}

impl Default for FldMix {
    fn default() -> Self {
        Self::new()
    }
}
