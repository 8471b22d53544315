//! Strategy abstraction and the intent vocabulary.
//!
//! Strategies are pure decision-makers: each step consumes a price
//! snapshot, an order update, or a timer tick and returns intents. All
//! effects (quoting, signing, posting) happen in the runtime, so a
//! strategy is testable with nothing but constructed snapshots.
//!
//! # Architecture
//!
//! Each strategy implements the [`Strategy`] trait and runs inside its
//! own single-threaded [`runtime::StrategyRuntime`] loop. The
//! [`StrategyRegistry`] maps registry keys from configuration to
//! constructors; both paired-trading variants register under distinct
//! keys.

pub mod arb;
pub mod paired;
pub mod runtime;

use rust_decimal::Decimal;

use crate::core::domain::{Market, Outcome, PairedPosition, Pips};
use crate::core::service::OrderUpdate;
use crate::error::{Error, Result};

/// Best bid/ask for one outcome token. Zero means absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quote {
    pub bid: Pips,
    pub ask: Pips,
}

/// Latest quotes for both sides, as snapshotted by the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairSnapshot {
    pub yes: Option<Quote>,
    pub no: Option<Quote>,
}

impl PairSnapshot {
    #[must_use]
    pub fn quote(&self, outcome: Outcome) -> Option<Quote> {
        match outcome {
            Outcome::Yes => self.yes,
            Outcome::No => self.no,
        }
    }

    /// Highest bid across both sides; the cycle's "hot" price.
    #[must_use]
    pub fn max_bid(&self) -> Pips {
        let yes = self.yes.map(|q| q.bid).unwrap_or_default();
        let no = self.no.map(|q| q.bid).unwrap_or_default();
        yes.max(no)
    }
}

/// What a strategy wants done. One intent is selected per step; the
/// runtime splits it into lot-sized chunks and submits them under the
/// in-flight limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Accumulate a leg toward the phase target.
    Build {
        outcome: Outcome,
        size: Decimal,
        limit: Pips,
    },
    /// Eliminate negative projected profit on a leg.
    LockRisk {
        outcome: Outcome,
        size: Decimal,
        limit: Pips,
    },
    /// Cheap protection at an extreme price.
    Insurance {
        outcome: Outcome,
        size: Decimal,
        limit: Pips,
    },
    /// Overweight the stronger leg once locked.
    Amplify {
        outcome: Outcome,
        size: Decimal,
        limit: Pips,
    },
    /// Buy a complete set: both outcomes at their effective prices.
    BuyPair {
        size: Decimal,
        yes_limit: Pips,
        no_limit: Pips,
    },
}

impl Intent {
    /// Tag for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Build { .. } => "build",
            Self::LockRisk { .. } => "lock_risk",
            Self::Insurance { .. } => "insurance",
            Self::Amplify { .. } => "amplify",
            Self::BuyPair { .. } => "buy_pair",
        }
    }

    /// Total share size the intent asks for.
    #[must_use]
    pub const fn size(&self) -> Decimal {
        match self {
            Self::Build { size, .. }
            | Self::LockRisk { size, .. }
            | Self::Insurance { size, .. }
            | Self::Amplify { size, .. }
            | Self::BuyPair { size, .. } => *size,
        }
    }
}

/// A decision-making strategy driven by one runtime loop.
///
/// All methods run on the loop's single thread; implementations keep
/// their state unguarded.
pub trait Strategy: Send {
    /// Registry key, used in configuration and logging.
    fn id(&self) -> &'static str;

    /// The market cycle this instance trades.
    fn market(&self) -> &Market;

    /// React to a fresh price snapshot. `now_ms` is unix milliseconds.
    fn on_prices(&mut self, snapshot: &PairSnapshot, now_ms: i64) -> Vec<Intent>;

    /// React to an order update (fills move the position).
    fn on_order_update(&mut self, _update: &OrderUpdate, _now_ms: i64) -> Vec<Intent> {
        Vec::new()
    }

    /// Deadline-driven logic between price events.
    fn on_tick(&mut self, _now_ms: i64) -> Vec<Intent> {
        Vec::new()
    }

    /// Current paired position, for logging and invariant checks.
    fn position(&self) -> PairedPosition {
        PairedPosition::new()
    }
}

/// Constructor signature for registry entries.
pub type StrategyCtor = fn(&StrategySettings, Market) -> Box<dyn Strategy>;

/// Per-strategy tunables from configuration. One struct serves every
/// engine; unused fields are ignored by simpler strategies.
#[derive(Debug, Clone)]
pub struct StrategySettings {
    pub base_target: Decimal,
    pub build_lot_size: Decimal,
    pub build_threshold: Pips,
    pub build_end_secs: i64,
    pub amplify_start_secs: i64,
    pub early_lock_price: Pips,
    pub early_amplify_price: Pips,
    pub lock_threshold: Decimal,
    pub insurance_price: Pips,
    pub max_slippage: Pips,
    pub min_order_usdc: Decimal,
    pub auto_adjust_size: bool,
    pub max_size_adjust_ratio: Decimal,
    pub arb_profit_threshold_pips: u32,
    pub cooldown_ms: i64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            base_target: dec!(10),
            build_lot_size: dec!(2),
            build_threshold: Pips::new(6_000).expect("const pips"),
            build_end_secs: 300,
            amplify_start_secs: 600,
            early_lock_price: Pips::new(8_500).expect("const pips"),
            early_amplify_price: Pips::new(9_300).expect("const pips"),
            lock_threshold: dec!(3),
            insurance_price: Pips::new(500).expect("const pips"),
            max_slippage: Pips::new(200).expect("const pips"),
            min_order_usdc: dec!(1),
            auto_adjust_size: true,
            max_size_adjust_ratio: dec!(5),
            arb_profit_threshold_pips: 300,
            cooldown_ms: 1_000,
        }
    }
}

/// Registry of strategy constructors keyed by their configuration id.
pub struct StrategyRegistry {
    entries: Vec<(&'static str, StrategyCtor)>,
}

impl StrategyRegistry {
    /// Registry with every built-in strategy installed.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
        };
        registry.register(paired::PHASE_ID, paired::new_phase_strategy);
        registry.register(paired::COMPLETE_SET_ID, paired::new_complete_set_strategy);
        registry.register(arb::ID, arb::new_strategy);
        registry
    }

    pub fn register(&mut self, id: &'static str, ctor: StrategyCtor) {
        self.entries.push((id, ctor));
    }

    /// Instantiate a strategy by registry key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Strategy`] for unknown keys.
    pub fn build(
        &self,
        id: &str,
        settings: &StrategySettings,
        market: Market,
    ) -> Result<Box<dyn Strategy>> {
        self.entries
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, ctor)| ctor(settings, market))
            .ok_or_else(|| Error::Strategy(format!("unknown strategy id {id}")))
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::TokenId;
    use rust_decimal_macros::dec;

    fn market() -> Market {
        Market::new(
            "btc-updown-15m-1700000000",
            "0xcond",
            TokenId::from("111"),
            TokenId::from("222"),
            false,
            1_700_000_000,
            900,
            Pips::new(100).unwrap(),
            dec!(1.00),
            dec!(0.1),
        )
    }

    #[test]
    fn builtin_registry_exposes_both_paired_variants() {
        let registry = StrategyRegistry::builtin();
        let ids = registry.ids();

        assert!(ids.contains(&"paired_trading"));
        assert!(ids.contains(&"pairedtrading"));
        assert!(ids.contains(&"long_arb"));
    }

    #[test]
    fn unknown_id_is_a_strategy_error() {
        let registry = StrategyRegistry::builtin();
        assert!(registry
            .build("nope", &StrategySettings::default(), market())
            .is_err());
    }

    #[test]
    fn build_returns_strategy_with_matching_id() {
        let registry = StrategyRegistry::builtin();
        let strategy = registry
            .build("paired_trading", &StrategySettings::default(), market())
            .unwrap();
        assert_eq!(strategy.id(), "paired_trading");
    }

    #[test]
    fn snapshot_max_bid_spans_both_sides() {
        let snapshot = PairSnapshot {
            yes: Some(Quote {
                bid: Pips::new(5_400).unwrap(),
                ask: Pips::new(5_600).unwrap(),
            }),
            no: Some(Quote {
                bid: Pips::new(4_600).unwrap(),
                ask: Pips::new(4_700).unwrap(),
            }),
        };
        assert_eq!(snapshot.max_bid().pips(), 5_400);
    }
}
