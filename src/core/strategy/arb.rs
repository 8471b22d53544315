//! Long-arbitrage round strategy.
//!
//! Watches the effective buy prices of the pair and buys one complete
//! set whenever the combined effective cost sits under one unit by at
//! least the profit threshold. A cooldown keeps one detected round from
//! firing repeatedly off the same book.

use rust_decimal_macros::dec;
use tracing::info;

use crate::core::domain::{check_arbitrage, Market, TopOfBook};

use super::{Intent, PairSnapshot, Strategy, StrategySettings};

/// Registry key.
pub const ID: &str = "long_arb";

/// Constructor for the registry.
#[must_use]
pub fn new_strategy(settings: &StrategySettings, market: Market) -> Box<dyn Strategy> {
    Box::new(LongArbStrategy::new(settings.clone(), market))
}

/// One-share long-arbitrage rounds with a cooldown.
pub struct LongArbStrategy {
    settings: StrategySettings,
    market: Market,
    last_fired_ms: i64,
}

impl LongArbStrategy {
    #[must_use]
    pub fn new(settings: StrategySettings, market: Market) -> Self {
        Self {
            settings,
            market,
            last_fired_ms: 0,
        }
    }
}

impl Strategy for LongArbStrategy {
    fn id(&self) -> &'static str {
        ID
    }

    fn market(&self) -> &Market {
        &self.market
    }

    fn on_prices(&mut self, snapshot: &PairSnapshot, now_ms: i64) -> Vec<Intent> {
        if now_ms - self.last_fired_ms < self.settings.cooldown_ms {
            return Vec::new();
        }

        let (Some(yes), Some(no)) = (snapshot.yes, snapshot.no) else {
            return Vec::new();
        };

        let book = TopOfBook {
            yes_bid: yes.bid,
            yes_ask: yes.ask,
            no_bid: no.bid,
            no_ask: no.ask,
            ..TopOfBook::default()
        };

        let Some(opportunity) = check_arbitrage(&book) else {
            return Vec::new();
        };
        if opportunity.profit_pips < self.settings.arb_profit_threshold_pips {
            return Vec::new();
        }

        info!(
            strategy = ID,
            market = %self.market.slug(),
            profit_pips = opportunity.profit_pips,
            buy_yes = %opportunity.buy_yes,
            buy_no = %opportunity.buy_no,
            "Long arbitrage round"
        );

        self.last_fired_ms = now_ms;
        vec![Intent::BuyPair {
            size: dec!(1),
            yes_limit: opportunity.buy_yes,
            no_limit: opportunity.buy_no,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Pips, TokenId};
    use crate::core::strategy::Quote;
    use rust_decimal_macros::dec;

    fn pips(p: u32) -> Pips {
        Pips::new(p).unwrap()
    }

    fn snapshot(yes_ask: u32, no_ask: u32) -> PairSnapshot {
        PairSnapshot {
            yes: Some(Quote {
                bid: pips(yes_ask.saturating_sub(100)),
                ask: pips(yes_ask),
            }),
            no: Some(Quote {
                bid: pips(no_ask.saturating_sub(100)),
                ask: pips(no_ask),
            }),
        }
    }

    fn strategy() -> LongArbStrategy {
        LongArbStrategy::new(
            StrategySettings::default(),
            Market::new(
                "btc-updown-15m-1700000000",
                "0xcond",
                TokenId::from("111"),
                TokenId::from("222"),
                false,
                1_700_000_000,
                900,
                pips(100),
                dec!(1.00),
                dec!(0.1),
            ),
        )
    }

    #[test]
    fn fires_one_pair_buy_on_wide_arb() {
        let mut s = strategy();
        // Sum of asks 0.96: 400 pips of profit against a 300 gate.
        let intents = s.on_prices(&snapshot(4_800, 4_800), 1_000);

        assert_eq!(intents.len(), 1);
        let Intent::BuyPair { size, .. } = &intents[0] else {
            panic!("expected buy_pair");
        };
        assert_eq!(*size, dec!(1));
    }

    #[test]
    fn cooldown_blocks_refire() {
        let mut s = strategy();
        let snap = snapshot(4_800, 4_800);

        assert_eq!(s.on_prices(&snap, 1_000).len(), 1);
        assert!(s.on_prices(&snap, 1_500).is_empty());
        assert_eq!(s.on_prices(&snap, 2_100).len(), 1);
    }

    #[test]
    fn thin_edges_are_ignored() {
        let mut s = strategy();
        // 200 pips of profit misses the 300 gate.
        assert!(s.on_prices(&snapshot(4_900, 4_900), 1_000).is_empty());
    }
}
