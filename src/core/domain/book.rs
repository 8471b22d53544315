//! Top-of-book views and the effective-price / arbitrage analysis.
//!
//! A binary pair can be traded on either token's book: buying YES outright
//! or buying the complete set and selling NO are the same economic trade.
//! The effective prices fold both routes into one mirrored view.

use rust_decimal::Decimal;

use super::price::Pips;

/// Best bid/ask for both outcome tokens. A zero price means that side of
/// the book is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopOfBook {
    pub yes_bid: Pips,
    pub yes_ask: Pips,
    pub no_bid: Pips,
    pub no_ask: Pips,
    /// Shares available at the best yes/no asks.
    pub yes_ask_size: Decimal,
    pub no_ask_size: Decimal,
    /// Snapshot time, unix seconds.
    pub taken_at: i64,
}

impl TopOfBook {
    /// True when both ask sides are present.
    #[must_use]
    pub fn has_both_asks(&self) -> bool {
        !self.yes_ask.is_zero() && !self.no_ask.is_zero()
    }
}

/// Mirrored effective buy/sell prices for both outcomes.
///
/// * `effective_buy_yes = min(yes_ask, 1 - no_bid)` - buy YES directly, or
///   buy the pair and sell NO.
/// * `effective_sell_yes = max(yes_bid, 1 - no_ask)` - sell YES directly,
///   or buy NO and merge the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePrices {
    pub buy_yes: Pips,
    pub buy_no: Pips,
    pub sell_yes: Pips,
    pub sell_no: Pips,
}

impl EffectivePrices {
    /// Derive effective prices from a top-of-book snapshot.
    ///
    /// An absent ask disables the direct route on that side; an absent bid
    /// disables the mirrored route. Prices of zero propagate so callers can
    /// gate on availability.
    #[must_use]
    pub fn from_book(book: &TopOfBook) -> Self {
        Self {
            buy_yes: min_present(book.yes_ask, mirror_ask(book.no_bid)),
            buy_no: min_present(book.no_ask, mirror_ask(book.yes_bid)),
            sell_yes: book.yes_bid.max(mirror_bid(book.no_ask)),
            sell_no: book.no_bid.max(mirror_bid(book.yes_ask)),
        }
    }
}

/// Mirror a bid into the complementary buy route; absent stays absent.
fn mirror_ask(bid: Pips) -> Pips {
    if bid.is_zero() {
        Pips::ZERO
    } else {
        bid.complement()
    }
}

/// Mirror an ask into the complementary sell route; absent stays absent.
fn mirror_bid(ask: Pips) -> Pips {
    if ask.is_zero() {
        Pips::ZERO
    } else {
        ask.complement()
    }
}

/// Minimum of two prices treating zero as "unavailable".
fn min_present(a: Pips, b: Pips) -> Pips {
    match (a.is_zero(), b.is_zero()) {
        (true, _) => b,
        (_, true) => a,
        _ => a.min(b),
    }
}

/// A long arbitrage: both outcomes buyable for a combined price under one
/// unit of stablecoin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrageOpportunity {
    pub buy_yes: Pips,
    pub buy_no: Pips,
    /// `10000 - (buy_yes + buy_no)`.
    pub profit_pips: u32,
}

/// Detect a long arbitrage from a top-of-book snapshot.
#[must_use]
pub fn check_arbitrage(book: &TopOfBook) -> Option<ArbitrageOpportunity> {
    let eff = EffectivePrices::from_book(book);
    if eff.buy_yes.is_zero() || eff.buy_no.is_zero() {
        return None;
    }

    let combined = eff.buy_yes.pips() + eff.buy_no.pips();
    if combined >= Pips::ONE.pips() {
        return None;
    }

    Some(ArbitrageOpportunity {
        buy_yes: eff.buy_yes,
        buy_no: eff.buy_no,
        profit_pips: Pips::ONE.pips() - combined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pips(p: u32) -> Pips {
        Pips::new(p).unwrap()
    }

    fn book(yes_bid: u32, yes_ask: u32, no_bid: u32, no_ask: u32) -> TopOfBook {
        TopOfBook {
            yes_bid: pips(yes_bid),
            yes_ask: pips(yes_ask),
            no_bid: pips(no_bid),
            no_ask: pips(no_ask),
            ..TopOfBook::default()
        }
    }

    #[test]
    fn effective_prices_closed_form() {
        let eff = EffectivePrices::from_book(&book(5500, 5600, 4700, 4800));

        assert_eq!(eff.buy_yes.pips(), 5300);
        assert_eq!(eff.buy_no.pips(), 4500);
        assert_eq!(eff.sell_yes.pips(), 5500);
        assert_eq!(eff.sell_no.pips(), 4700);
    }

    #[test]
    fn detects_long_arbitrage() {
        let opp = check_arbitrage(&book(5200, 4900, 5200, 4900)).expect("long arb");

        assert_eq!(opp.profit_pips, 400);
        assert_eq!(opp.buy_yes.pips(), 4800);
        assert_eq!(opp.buy_no.pips(), 4800);
    }

    #[test]
    fn no_arbitrage_on_balanced_book() {
        assert!(check_arbitrage(&book(5400, 5600, 4400, 4600)).is_none());
    }

    #[test]
    fn no_arbitrage_when_one_side_absent() {
        assert!(check_arbitrage(&book(0, 4800, 0, 0)).is_none());
    }

    #[test]
    fn absent_sides_do_not_fake_prices() {
        // No bids anywhere: effective buys fall back to the direct asks.
        let eff = EffectivePrices::from_book(&book(0, 5600, 0, 4800));
        assert_eq!(eff.buy_yes.pips(), 5600);
        assert_eq!(eff.buy_no.pips(), 4800);
        // Selling YES can still route through buying NO at its ask.
        assert_eq!(eff.sell_yes.pips(), 5200);
    }
}
