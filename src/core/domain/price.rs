//! Fixed-point price model.
//!
//! Prices on a binary market live in the open unit interval and are
//! represented as integer *pips* (ten-thousandths of a unit). All price
//! arithmetic stays in integers; floating point appears only at display
//! and basis-point boundaries.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Integer price in ten-thousandths of a unit, in `[0, 10000]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pips(u32);

impl Pips {
    /// One full unit of the stablecoin.
    pub const ONE: Self = Self(10_000);

    /// Zero price (also used for an absent book side).
    pub const ZERO: Self = Self(0);

    /// Pips per cent.
    pub const PER_CENT: u32 = 100;

    /// Construct from a raw pip count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPips`] when outside `[0, 10000]`.
    pub fn new(pips: u32) -> Result<Self> {
        if pips > Self::ONE.0 {
            return Err(Error::InvalidPips(i64::from(pips)));
        }
        Ok(Self(pips))
    }

    /// Construct from whole cents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPips`] when outside `[0, 100]` cents.
    pub fn from_cents(cents: u32) -> Result<Self> {
        Self::new(cents.saturating_mul(Self::PER_CENT))
    }

    /// Construct from a decimal price, rounding half-up to the nearest pip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPips`] when the rounded value falls outside
    /// `[0, 10000]` pips or the input is not representable.
    pub fn from_decimal(price: Decimal) -> Result<Self> {
        let scaled = (price * Decimal::from(Self::ONE.0))
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        let pips = scaled
            .to_i64()
            .ok_or_else(|| Error::InvalidPips(i64::MAX))?;
        if pips < 0 || pips > i64::from(Self::ONE.0) {
            return Err(Error::InvalidPips(pips));
        }
        Self::new(pips as u32)
    }

    /// Raw pip count.
    #[must_use]
    pub const fn pips(self) -> u32 {
        self.0
    }

    /// Price in whole cents, rounded to nearest.
    #[must_use]
    pub const fn to_cents(self) -> u32 {
        (self.0 + Self::PER_CENT / 2) / Self::PER_CENT
    }

    /// Price as a decimal in `[0, 1]`.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(i64::from(self.0), 4)
    }

    /// The complementary price `10000 - self`.
    ///
    /// Buying the pair and selling the other side is economically a trade
    /// at the complement.
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(Self::ONE.0 - self.0)
    }

    /// Saturating addition, clamped to one unit.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self((self.0 + other.0).min(Self::ONE.0))
    }

    /// Saturating subtraction, clamped to zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition within the valid range.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        let sum = self.0.checked_add(other.0)?;
        (sum <= Self::ONE.0).then_some(Self(sum))
    }

    /// Clamp into `[lo, hi]`.
    #[must_use]
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        Self(self.0.clamp(lo.0, hi.0))
    }

    /// True when this side of a book is absent (zero).
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Round down to the nearest multiple of `tick` pips.
    ///
    /// The exchange tick is 100 pips (one cent) for most markets.
    #[must_use]
    pub const fn round_to_tick(self, tick: u32) -> Self {
        if tick == 0 {
            return self;
        }
        Self(self.0 / tick * tick)
    }
}

impl fmt::Display for Pips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn from_cents_round_trips() {
        for cents in 0..=100 {
            let p = Pips::from_cents(cents).unwrap();
            assert_eq!(p.to_cents(), cents);
        }
    }

    #[test]
    fn decimal_round_trips_every_pip() {
        for pips in (0..=10_000).step_by(7) {
            let p = Pips::new(pips).unwrap();
            assert_eq!(Pips::from_decimal(p.to_decimal()).unwrap(), p);
        }
    }

    #[test]
    fn from_decimal_rounds_half_up() {
        assert_eq!(Pips::from_decimal(dec!(0.55555)).unwrap().pips(), 5556);
        assert_eq!(Pips::from_decimal(dec!(0.55554)).unwrap().pips(), 5555);
        assert_eq!(Pips::from_decimal(dec!(0.00005)).unwrap().pips(), 1);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Pips::new(10_001).is_err());
        assert!(Pips::from_decimal(dec!(1.1)).is_err());
        assert!(Pips::from_decimal(dec!(-0.01)).is_err());
    }

    #[test]
    fn complement_is_involutive() {
        let p = Pips::new(5_300).unwrap();
        assert_eq!(p.complement().pips(), 4_700);
        assert_eq!(p.complement().complement(), p);
    }

    #[test]
    fn to_cents_rounds_to_nearest() {
        assert_eq!(Pips::new(5_549).unwrap().to_cents(), 55);
        assert_eq!(Pips::new(5_550).unwrap().to_cents(), 56);
    }

    #[test]
    fn round_to_tick_floors() {
        assert_eq!(Pips::new(5_678).unwrap().round_to_tick(100).pips(), 5_600);
        assert_eq!(Pips::new(5_600).unwrap().round_to_tick(100).pips(), 5_600);
    }

    #[test]
    fn saturating_ops_stay_in_range() {
        let p = Pips::new(9_000).unwrap();
        assert_eq!(p.saturating_add(Pips::new(2_000).unwrap()), Pips::ONE);
        assert_eq!(
            Pips::new(100).unwrap().saturating_sub(Pips::new(200).unwrap()),
            Pips::ZERO
        );
    }
}
