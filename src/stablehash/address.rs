use std::fmt;

/// Multiplier applied when descending to a child address. A large prime so
/// that any change in the path spreads through all 128 bits.
const CHILD_MULTIPLIER: u128 = 486_187_739;

/// Deterministic 128-bit path identifying where a value sits within a hashed
/// structure.
///
/// Children derive from their parent by a wrapping multiply-add, and
/// [`Address::unordered`] restarts the path at the root so that elements of
/// unordered containers hash independently of their siblings' positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(u128);

impl Address {
    pub fn root() -> Self {
        Address(17)
    }

    #[inline]
    pub fn child(self, number: u64) -> Self {
        Address(
            self.0
                .wrapping_mul(CHILD_MULTIPLIER)
                .wrapping_add(number as u128),
        )
    }

    /// Returns `(element_address, deposit_address)` for one entry of an
    /// unordered container: the entry is hashed under a fresh root into a
    /// temporary hasher, then deposited at the current address.
    #[inline]
    pub fn unordered(self) -> (Self, Self) {
        (Self::root(), self)
    }

    /// Splits into `(low, high)` 64-bit halves; the low half seeds the leaf
    /// hash and the high half feeds the mixer.
    pub fn low_high(self) -> (u64, u64) {
        (self.0 as u64, (self.0 >> 64) as u64)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
