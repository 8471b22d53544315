//! Decoded trade events for watched parties.
//!
//! Events come from two sources: pending transactions decoded out of the
//! mempool, and confirmed `OrderFilled` logs. Both normalize into one
//! record so downstream consumers do not care which path saw the fill
//! first.

use std::fmt;

use rust_decimal::Decimal;

use super::order::Side;

/// Whether the watched party rested liquidity or crossed the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Maker,
    Taker,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Maker => "MAKER",
            Self::Taker => "TAKER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which exchange contract carried the fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Standard,
    NegRisk,
    NegRiskAdapter,
}

impl ContractKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::NegRisk => "neg_risk",
            Self::NegRiskAdapter => "neg_risk_adapter",
        }
    }
}

/// A decoded pending or confirmed fill touching a watched address.
///
/// Amount fields are six-decimal base units as they appear on the wire;
/// `fill_shares` is the per-order share of the fill converted to native
/// shares.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub tx_hash: String,
    /// Present only for confirmed log events; distinguishes multiple fills
    /// inside one transaction.
    pub log_index: Option<u64>,
    /// The watched address that participated, lowercase hex.
    pub party: String,
    pub role: Role,
    pub side: Side,
    pub token_id: String,
    pub maker_amount: u128,
    pub taker_amount: u128,
    /// Per-order fill in six-decimal base units.
    pub fill_amount: u128,
    pub order_salt: u128,
    /// Unix milliseconds at decode time.
    pub detected_at: i64,
    pub contract: ContractKind,
}

impl TradeEvent {
    /// Price implied by the order's two legs, as a decimal in `[0, 1]`.
    ///
    /// BUY orders give stablecoin (maker leg) for shares (taker leg), so
    /// price is maker/taker; SELL is the reverse.
    #[must_use]
    pub fn price(&self) -> Option<Decimal> {
        let (usdc, shares) = match self.side {
            Side::Buy => (self.maker_amount, self.taker_amount),
            Side::Sell => (self.taker_amount, self.maker_amount),
        };
        if shares == 0 {
            return None;
        }
        Some(Decimal::from(usdc) / Decimal::from(shares))
    }

    /// Fill size in native shares.
    #[must_use]
    pub fn fill_shares(&self) -> Decimal {
        Decimal::new(self.fill_amount as i64, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(side: Side, maker_amount: u128, taker_amount: u128) -> TradeEvent {
        TradeEvent {
            tx_hash: "0xabc".into(),
            log_index: None,
            party: "0xdef".into(),
            role: Role::Taker,
            side,
            token_id: "1".into(),
            maker_amount,
            taker_amount,
            fill_amount: 1_000_000,
            order_salt: 42,
            detected_at: 0,
            contract: ContractKind::Standard,
        }
    }

    #[test]
    fn buy_price_is_maker_over_taker() {
        let e = event(Side::Buy, 450_000, 1_000_000);
        assert_eq!(e.price().unwrap(), dec!(0.45));
    }

    #[test]
    fn sell_price_is_taker_over_maker() {
        let e = event(Side::Sell, 1_000_000, 450_000);
        assert_eq!(e.price().unwrap(), dec!(0.45));
    }

    #[test]
    fn zero_share_leg_has_no_price() {
        assert!(event(Side::Buy, 450_000, 0).price().is_none());
    }

    #[test]
    fn fill_converts_base_units_to_shares() {
        let mut e = event(Side::Buy, 1, 1);
        e.fill_amount = 2_500_000;
        assert_eq!(e.fill_shares(), dec!(2.5));
    }
}
