//! Fixed-point conversion for on-chain prices.
//!
//! # Design Philosophy
//!
//! - Sources report prices as `f64` decimals
//! - The oracle contract stores `u64` integers scaled by `10^exponent`
//! - Conversion happens exactly once, right before the command is built
//! - Rounding is to nearest, half away from zero
//!
//! # Usage
//!
//! ```rust
//! use feeder_rust_core::utils::fixed_point::ScaledPrice;
//!
//! let scaled = ScaledPrice::from_price(1.5, 9).unwrap();
//! assert_eq!(scaled.value(), 1_500_000_000);
//! assert_eq!(scaled.to_string(), "1500000000");
//! ```

use crate::error::{FeederError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest exponent accepted; `10^18` still fits comfortably in a u64 scale.
pub const MAX_EXPONENT: u32 = 18;

/// Price scaled by `10^exponent` and rounded, as stored on-chain.
///
/// Only constructible from a finite, strictly positive price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScaledPrice {
    value: u64,
    exponent: u32,
}

impl ScaledPrice {
    /// Scale `price` by `10^exponent`, rounding to the nearest integer.
    pub fn from_price(price: f64, exponent: u32) -> Result<Self> {
        if !price.is_finite() {
            return Err(FeederError::invalid_price(price, "price is not finite"));
        }
        if price <= 0.0 {
            return Err(FeederError::invalid_price(price, "price must be positive"));
        }
        if exponent > MAX_EXPONENT {
            return Err(FeederError::invalid_price(
                price,
                format!("exponent {} exceeds maximum {}", exponent, MAX_EXPONENT),
            ));
        }

        let scaled = (price * pow10(exponent)).round();

        if scaled < 1.0 {
            return Err(FeederError::invalid_price(
                price,
                format!("price rounds to zero at exponent {}", exponent),
            ));
        }
        // u64::MAX as f64 rounds up to 2^64, so >= catches every overflow
        if scaled >= u64::MAX as f64 {
            return Err(FeederError::invalid_price(
                price,
                format!("scaled price overflows u64 at exponent {}", exponent),
            ));
        }

        Ok(Self {
            value: scaled as u64,
            exponent,
        })
    }

    #[inline]
    pub const fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub const fn exponent(&self) -> u32 {
        self.exponent
    }

    /// Back to a decimal (for logging only)
    #[inline]
    pub fn as_decimal(&self) -> f64 {
        self.value as f64 / pow10(self.exponent)
    }
}

impl fmt::Display for ScaledPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[inline]
fn pow10(exponent: u32) -> f64 {
    10f64.powi(exponent as i32)
}
