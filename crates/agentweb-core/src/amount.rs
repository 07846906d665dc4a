//! Payment amount type.
//!
//! Amounts are counted in the asset's smallest unit (micro-units for the
//! six-decimal stable assets the protocol settles in). All arithmetic is
//! integer-only and overflow-safe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Number of decimal places used when rendering amounts.
pub const DECIMALS: u32 = 6;

/// Smallest units per whole token.
pub const MICRO_PER_UNIT: u64 = 1_000_000;

/// Basis-point denominator (100% = 10 000 bps).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// An amount of a fungible asset in its smallest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount constant.
    pub const ZERO: Self = Self(0);

    /// Maximum possible amount.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates an amount from smallest units.
    #[must_use]
    pub const fn from_micro(micro: u64) -> Self {
        Self(micro)
    }

    /// Creates an amount from whole tokens, saturating on overflow.
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(MICRO_PER_UNIT))
    }

    /// Returns the amount in smallest units.
    #[must_use]
    pub const fn as_micro(self) -> u64 {
        self.0
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Returns `floor(self * bps / 10_000)`.
    ///
    /// Uses a `u128` intermediate so the product can never overflow; the
    /// result never exceeds `self` when `bps <= 10_000`.
    #[must_use]
    pub const fn basis_points(self, bps: u32) -> Self {
        let scaled = self.0 as u128 * bps as u128 / BPS_DENOMINATOR as u128;
        if scaled > u64::MAX as u128 {
            Self::MAX
        } else {
            Self(scaled as u64)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICRO_PER_UNIT;
        let frac = self.0 % MICRO_PER_UNIT;
        write!(f, "{whole}.{frac:06}")
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    /// Parses either a whole number of smallest units (`"5000"`) or a decimal
    /// token amount (`"0.005"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(CoreError::InvalidAmount("negative values not allowed".into()));
        }

        match s.split_once('.') {
            None => s
                .parse::<u64>()
                .map(Amount)
                .map_err(|_| CoreError::InvalidAmount(format!("invalid number: {s}"))),
            Some((whole, frac)) => {
                if frac.len() > DECIMALS as usize {
                    return Err(CoreError::InvalidAmount("too many decimal places".into()));
                }
                let whole: u64 = if whole.is_empty() {
                    0
                } else {
                    whole
                        .parse()
                        .map_err(|_| CoreError::InvalidAmount(format!("invalid whole part: {s}")))?
                };
                let padded = format!("{frac:0<6}");
                let frac: u64 = padded
                    .parse()
                    .map_err(|_| CoreError::InvalidAmount(format!("invalid fractional part: {s}")))?;

                whole
                    .checked_mul(MICRO_PER_UNIT)
                    .and_then(|w| w.checked_add(frac))
                    .map(Amount)
                    .ok_or_else(|| CoreError::InvalidAmount("overflow".into()))
            }
        }
    }
}
