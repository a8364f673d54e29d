//! Exact fixed-point representation of prices and quantities.
//!
//! Every price and quantity inside the matching core is an `i64` scaled by
//! [`FIXED8_ONE`] (8 decimal places). Integer comparison is exact, so two
//! nodes can never disagree on whether two prices are equal. [`Decimal`] is
//! only used at the edges (configuration, display).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::constants::{FIXED8_ONE, PRICE_PRECISION};
use crate::{BlockmatchError, Result};

/// A price, scaled by [`FIXED8_ONE`].
pub type Price = i64;

/// A quantity, scaled by [`FIXED8_ONE`].
pub type Qty = i64;

/// Convert a decimal into its fixed-point form.
///
/// Fails if the value carries more than [`PRICE_PRECISION`] fractional digits
/// or does not fit in an `i64` once scaled.
pub fn to_fixed8(value: Decimal) -> Result<i64> {
    let scaled = value
        .checked_mul(Decimal::from(FIXED8_ONE))
        .ok_or_else(|| BlockmatchError::InvalidFixedPoint {
            value: value.to_string(),
            reason: "out of range",
        })?;
    if !scaled.fract().is_zero() {
        return Err(BlockmatchError::InvalidFixedPoint {
            value: value.to_string(),
            reason: "more than 8 decimal places",
        });
    }
    scaled.to_i64().ok_or_else(|| BlockmatchError::InvalidFixedPoint {
        value: value.to_string(),
        reason: "out of range",
    })
}

/// Convert a fixed-point value back into a normalized decimal.
#[must_use]
pub fn from_fixed8(raw: i64) -> Decimal {
    Decimal::new(raw, PRICE_PRECISION).normalize()
}
