use super::{Address, StableHash, StableHasher};
use num_bigint::BigInt;
use num_traits::{One, Zero};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum significant digits accepted by the reference subgraph store.
pub const MAX_SIGNIFICANT_DIGITS: u64 = 34;

// Digit-count estimate divisor, log2(10) to the precision the reference
// implementation uses. The estimate is only ever corrected upward by a loop
// that compares against powers of ten, and that loop is inert for negative
// mantissas; both behaviors are load-bearing for hash compatibility.
const LOG2_10: f64 = 3.3219280949;

/// Arbitrary-precision decimal represented as `mantissa · 10^-scale`.
///
/// This type is not for arithmetic. Its sole purpose is to parse and
/// normalize a decimal string exactly like the reference indexer so the
/// resulting `(mantissa, scale)` pair hashes identically, asymmetries near
/// the 34-digit boundary included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigDecimal {
    int: BigInt,
    scale: i64,
}

/// Errors surfaced while parsing a decimal string.
#[derive(Debug, Error)]
pub enum BigDecimalError {
    #[error("invalid exponent value {0:?}: {1}")]
    InvalidExponent(String, std::num::ParseIntError),
    #[error("failed to parse empty string")]
    Empty,
    #[error("invalid digits part {0:?}")]
    InvalidDigits(String),
}

impl BigDecimal {
    /// Returns the normalized `(mantissa, scale)` pair.
    pub fn as_parts(&self) -> (&BigInt, i64) {
        (&self.int, self.scale)
    }
}

impl FromStr for BigDecimal {
    type Err = BigDecimalError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (base_part, exponent_value) = match input.find(['e', 'E']) {
            Some(loc) => {
                let (base, exp_raw) = (&input[..loc], &input[loc + 1..]);
                let exp_raw = exp_raw.strip_prefix('+').unwrap_or(exp_raw);
                let exp = i64::from_str(exp_raw).map_err(|err| {
                    BigDecimalError::InvalidExponent(exp_raw.to_string(), err)
                })?;
                (base, exp)
            }
            None => (input, 0),
        };

        if base_part.is_empty() {
            return Err(BigDecimalError::Empty);
        }

        let (digits, decimal_offset) = match base_part.find('.') {
            Some(loc) => {
                let (lead, trail) = (&base_part[..loc], &base_part[loc + 1..]);
                (format!("{lead}{trail}"), trail.len() as i64)
            }
            None => (base_part.to_string(), 0),
        };

        let scale = decimal_offset - exponent_value;
        let int =
            BigInt::from_str(&digits).map_err(|_| BigDecimalError::InvalidDigits(digits.clone()))?;

        let mut out = BigDecimal { int, scale };
        out.normalize();
        Ok(out)
    }
}

impl fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.int, -self.scale)
    }
}

impl BigDecimal {
    fn normalize(&mut self) {
        if self.int.is_zero() {
            self.scale = 0;
            return;
        }

        self.with_precision(MAX_SIGNIFICANT_DIGITS);

        // Trim trailing decimal zeros off the mantissa.
        let digits = self.int.magnitude().to_string();
        let trimmed = digits.trim_end_matches('0');
        let trailing_count = (digits.len() - trimmed.len()) as u64;
        if trailing_count > 0 {
            self.int = &self.int / ten_to_the(trailing_count);
            self.scale -= trailing_count as i64;
        }
    }

    fn with_precision(&mut self, precision: u64) {
        let digits = digit_count(&self.int);

        if digits > precision {
            let diff = digits - precision;
            let p = ten_to_the(diff);

            // Truncated division: the quotient rounds toward zero and the
            // remainder carries the dividend's sign, so negative mantissas
            // never receive a rounding term (rounding toward +inf).
            let mut q = &self.int / &p;
            let r = &self.int % &p;

            // A "leading zero" in the remainder means the dropped digits
            // cannot round the quotient up.
            if p < BigInt::from(10u32) * &r {
                q += rounding_term(&r);
            }

            self.int = q;
            self.scale -= diff as i64;
        } else if digits < precision {
            let diff = precision - digits;
            self.int *= ten_to_the(diff);
            self.scale += diff as i64;
        }
    }
}

impl StableHash for BigDecimal {
    fn stable_hash<H: StableHasher>(&self, addr: Address, state: &mut H) {
        self.scale.stable_hash(addr.child(1), state);
        // The mantissa uses the value address itself rather than a child:
        // the big-int rule is guaranteed never to touch child(1), so the two
        // components cannot collide and the scale slot stays free for schema
        // evolution.
        self.int.stable_hash(addr, state);
    }
}

/// Number of digits in the non-scaled integer representation.
fn digit_count(int: &BigInt) -> u64 {
    if int.is_zero() {
        return 1;
    }

    let bits = int.bits();
    let mut digits = (bits as f64 / LOG2_10) as u64;

    // Correct the estimate upward. The comparison is against the signed
    // value, so it never fires for negative mantissas; that undercount is
    // part of the reference behavior.
    let mut num = ten_to_the(digits);
    while *int >= num {
        num *= 10u32;
        digits += 1;
    }

    digits
}

/// Rounding term for the remainder of the precision division: one when the
/// remainder's high digit is five or more, zero otherwise.
fn rounding_term(num: &BigInt) -> BigInt {
    if num.is_zero() {
        return BigInt::zero();
    }

    let bits = num.bits() - num.trailing_zeros().unwrap_or(0);
    let digits = (bits as f64 / LOG2_10) as u64;

    let mut n = ten_to_the(digits);
    loop {
        if *num < n {
            return BigInt::one();
        }

        n *= 5u32;
        if *num < n {
            return BigInt::zero();
        }

        n *= 2u32;
    }
}

fn ten_to_the(pow: u64) -> BigInt {
    num_traits::pow(BigInt::from(10u32), pow as usize)
}
