//! Market-related domain types with proper encapsulation.

use rust_decimal::Decimal;

use super::id::{MarketSlug, TokenId};
use super::price::Pips;

/// Which side of a binary pair a token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// The other side of the pair.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }

    /// Name used in logs and exchange payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }
}

/// One cycle of a binary market.
///
/// Markets are immutable once created; cycle rollover creates a new
/// `Market` with a fresh slug and period start.
#[derive(Debug, Clone)]
pub struct Market {
    slug: MarketSlug,
    condition_id: String,
    yes_token: TokenId,
    no_token: TokenId,
    /// Signatures for this market verify against the neg-risk exchange.
    neg_risk: bool,
    /// Cycle start, unix seconds.
    period_start: i64,
    /// Cycle length, seconds.
    cycle_secs: i64,
    tick_size: Pips,
    min_order_notional: Decimal,
    min_share_size: Decimal,
}

impl Market {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        slug: impl Into<MarketSlug>,
        condition_id: impl Into<String>,
        yes_token: TokenId,
        no_token: TokenId,
        neg_risk: bool,
        period_start: i64,
        cycle_secs: i64,
        tick_size: Pips,
        min_order_notional: Decimal,
        min_share_size: Decimal,
    ) -> Self {
        Self {
            slug: slug.into(),
            condition_id: condition_id.into(),
            yes_token,
            no_token,
            neg_risk,
            period_start,
            cycle_secs,
            tick_size,
            min_order_notional,
            min_share_size,
        }
    }

    #[must_use]
    pub const fn slug(&self) -> &MarketSlug {
        &self.slug
    }

    #[must_use]
    pub fn condition_id(&self) -> &str {
        &self.condition_id
    }

    /// Token ID for the given outcome.
    #[must_use]
    pub const fn token(&self, outcome: Outcome) -> &TokenId {
        match outcome {
            Outcome::Yes => &self.yes_token,
            Outcome::No => &self.no_token,
        }
    }

    /// Which outcome a token represents, if it belongs to this market.
    #[must_use]
    pub fn outcome_of(&self, token: &TokenId) -> Option<Outcome> {
        if token == &self.yes_token {
            Some(Outcome::Yes)
        } else if token == &self.no_token {
            Some(Outcome::No)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn neg_risk(&self) -> bool {
        self.neg_risk
    }

    #[must_use]
    pub const fn period_start(&self) -> i64 {
        self.period_start
    }

    #[must_use]
    pub const fn cycle_end(&self) -> i64 {
        self.period_start + self.cycle_secs
    }

    /// Seconds elapsed in the current cycle at `now` (unix seconds).
    #[must_use]
    pub const fn elapsed(&self, now: i64) -> i64 {
        now - self.period_start
    }

    /// Seconds remaining in the current cycle at `now`, floored at zero.
    #[must_use]
    pub fn remaining(&self, now: i64) -> i64 {
        (self.cycle_end() - now).max(0)
    }

    #[must_use]
    pub const fn tick_size(&self) -> Pips {
        self.tick_size
    }

    #[must_use]
    pub const fn min_order_notional(&self) -> Decimal {
        self.min_order_notional
    }

    #[must_use]
    pub const fn min_share_size(&self) -> Decimal {
        self.min_share_size
    }
}

/// True for slugs of the quarter-hour up/down market family.
///
/// Prefix match: longer slugs carrying the same prefix (asset-suffixed
/// variants, per-cycle suffixes) all share the cycle semantics.
#[must_use]
pub fn is_quarter_hour_slug(slug: &str) -> bool {
    slug.len() >= 14 && slug.starts_with("btc-updown-15m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(period_start: i64) -> Market {
        Market::new(
            "btc-updown-15m-1700000000",
            "0xcond",
            TokenId::from("111"),
            TokenId::from("222"),
            false,
            period_start,
            900,
            Pips::new(100).unwrap(),
            dec!(1.00),
            dec!(0.1),
        )
    }

    #[test]
    fn cycle_clock() {
        let m = market(1_700_000_000);
        assert_eq!(m.elapsed(1_700_000_060), 60);
        assert_eq!(m.remaining(1_700_000_060), 840);
        assert_eq!(m.remaining(1_700_001_000), 0);
        assert_eq!(m.cycle_end(), 1_700_000_900);
    }

    #[test]
    fn outcome_lookup() {
        let m = market(0);
        assert_eq!(m.outcome_of(&TokenId::from("111")), Some(Outcome::Yes));
        assert_eq!(m.outcome_of(&TokenId::from("222")), Some(Outcome::No));
        assert_eq!(m.outcome_of(&TokenId::from("333")), None);
    }

    #[test]
    fn quarter_hour_slug_gate() {
        assert!(is_quarter_hour_slug("btc-updown-15m"));
        assert!(is_quarter_hour_slug("btc-updown-15m-1700000000"));
        assert!(!is_quarter_hour_slug("eth-updown-15m-1700000000"));
        assert!(!is_quarter_hour_slug("btc-updown-1h"));
    }
}
