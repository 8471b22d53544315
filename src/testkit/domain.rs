//! Builders for domain primitives used across tests.
//!
//! Provides concise factory functions for markets, quotes, snapshots,
//! and books so tests focus on assertions rather than construction
//! boilerplate.

use rust_decimal_macros::dec;

use crate::core::domain::{Market, Pips, TokenId, TopOfBook};
use crate::core::strategy::{PairSnapshot, Quote};

/// Default cycle start used across fixtures.
pub const PERIOD_START: i64 = 1_700_000_000;

/// A quarter-hour market with tokens `111` (YES) and `222` (NO).
#[must_use]
pub fn quarter_hour_market() -> Market {
    Market::new(
        format!("btc-updown-15m-{PERIOD_START}"),
        "0xcond",
        TokenId::from("111"),
        TokenId::from("222"),
        false,
        PERIOD_START,
        900,
        pips(100),
        dec!(1.00),
        dec!(0.1),
    )
}

/// Shorthand pips constructor for known-valid values.
///
/// # Panics
///
/// Panics on out-of-range input; fixtures use literals.
#[must_use]
pub fn pips(value: u32) -> Pips {
    Pips::new(value).expect("fixture pips in range")
}

#[must_use]
pub fn quote(bid: u32, ask: u32) -> Quote {
    Quote {
        bid: pips(bid),
        ask: pips(ask),
    }
}

/// Snapshot with both sides quoted.
#[must_use]
pub fn snapshot(yes: (u32, u32), no: (u32, u32)) -> PairSnapshot {
    PairSnapshot {
        yes: Some(quote(yes.0, yes.1)),
        no: Some(quote(no.0, no.1)),
    }
}

/// Top-of-book with default sizes and a fresh timestamp.
#[must_use]
pub fn top_of_book(yes_bid: u32, yes_ask: u32, no_bid: u32, no_ask: u32) -> TopOfBook {
    TopOfBook {
        yes_bid: pips(yes_bid),
        yes_ask: pips(yes_ask),
        no_bid: pips(no_bid),
        no_ask: pips(no_ask),
        yes_ask_size: dec!(50),
        no_ask_size: dec!(50),
        taken_at: PERIOD_START,
    }
}
