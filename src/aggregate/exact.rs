//! Exact fixed-point accumulation for clamped sums
//!
//! Left-to-right `f64` addition is not 1-Lipschitz: with enough rows the
//! rounding of each partial sum depends on the partial sum itself, and
//! two inputs differing in one row can end up further apart than that
//! row's value. The Laplace scale assumes they cannot.
//!
//! Each clamped value is instead rounded once onto a power-of-two grid and
//! summed as an integer. Integer addition is exact and order independent,
//! so one row moves the total by exactly its own grid value. The total is
//! saturated at `±2^LIMIT_BITS` grid units (a 1-Lipschitz map) and converted
//! to `f64` once. That single conversion moves each total by at most half
//! an `f64` spacing, `2^38` units below the limit, so a difference widens by
//! at most `2^39` units. [`FixedPointSum::sensitivity`] adds `2^40`.
//!
//! Grid layout for bounds with magnitude `b`, where `2^(e-1) < b <= 2^e`:
//! - step `2^(e - FRACTION_BITS)`: each row is off by at most `b * 2^-60`
//! - limit `2^LIMIT_BITS` units: `2^32 * 2^e`, over four billion rows at the bound
//! - conversion slack `2^40` units: `2^-20 * 2^e`

use crate::{Error, Result};

/// Grid units per `2^e`.
const FRACTION_BITS: i32 = 60;

/// Saturation point of the accumulated total, in grid units.
const LIMIT_BITS: i32 = 92;

/// Widening allowance for the final conversion, in grid units (twice the
/// worst case below `2^LIMIT_BITS`).
#[allow(clippy::cast_precision_loss)]
const CONVERSION_SLACK: f64 = (1u64 << (LIMIT_BITS - 52)) as f64;

/// Exponent range keeps every step and every saturated total a normal `f64`.
const MIN_EXPONENT: i32 = -900;
const MAX_EXPONENT: i32 = 900;

/// `2^e` for `|e| <= 1022`.
#[allow(clippy::cast_sign_loss)]
fn pow2(e: i32) -> f64 {
    f64::from_bits(((e + 1023) as u64) << 52)
}

/// Smallest grid exponent `e` with `bound <= 2^e`.
#[allow(clippy::cast_possible_truncation)]
fn exponent_for(bound: f64) -> i32 {
    let mut e = (bound.log2().ceil() as i32).clamp(MIN_EXPONENT, MAX_EXPONENT);
    while e < MAX_EXPONENT && pow2(e) < bound {
        e += 1;
    }
    while e > MIN_EXPONENT && pow2(e - 1) >= bound {
        e -= 1;
    }
    e
}

/// Integer accumulator of values clamped into `[lower, upper]`.
#[derive(Debug, Clone)]
pub(crate) struct FixedPointSum {
    lower: f64,
    upper: f64,
    step: f64,
    units: i128,
}

impl FixedPointSum {
    /// Accumulator for values clamped into `[lower, upper]`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBounds`] for inverted or non-finite bounds, or bounds
    /// beyond `±2^900`.
    pub(crate) fn new(lower: f64, upper: f64) -> Result<Self> {
        let bound = lower.abs().max(upper.abs());
        if !(lower.is_finite() && upper.is_finite() && lower <= upper) || bound > pow2(MAX_EXPONENT)
        {
            return Err(Error::InvalidBounds { lower, upper });
        }
        Ok(Self {
            lower,
            upper,
            step: pow2(exponent_for(bound) - FRACTION_BITS),
            units: 0,
        })
    }

    /// Grid units of `value` after clamping. Monotone in `value`.
    #[allow(clippy::cast_possible_truncation)]
    fn quantize(&self, value: f64) -> i128 {
        // Division by a power of two is exact; |result| <= 2^60.
        (value.clamp(self.lower, self.upper) / self.step).round() as i128
    }

    /// Add one finite value.
    pub(crate) fn add(&mut self, value: f64) {
        // Unreachable below 2^67 rows; saturating keeps it panic-free.
        self.units = self.units.saturating_add(self.quantize(value));
    }

    /// The total as `f64`, converted once.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn value(&self) -> f64 {
        let limit = 1i128 << LIMIT_BITS;
        let units = self.units.clamp(-limit, limit);
        // i128 -> f64 rounds to nearest; scaling by a power of two is exact.
        units as f64 * self.step
    }

    /// Largest change one row can cause in [`Self::value`].
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn sensitivity(&self) -> f64 {
        let widest = self
            .quantize(self.lower)
            .unsigned_abs()
            .max(self.quantize(self.upper).unsigned_abs());
        (widest as f64 + CONVERSION_SLACK) * self.step
    }
}
