//! Complete-set paired variant.
//!
//! Instead of walking phase windows, this variant watches the combined
//! ask of the pair: whenever YES + NO trades under one unit by at least
//! the configured margin, it buys the complete set. Every set bought at
//! a discount is riskless carry to resolution.

use rust_decimal::Decimal;
use tracing::debug;

use crate::core::domain::{Market, Outcome, PairedPosition, Pips};
use crate::core::service::{OrderStatus, OrderUpdate};

use super::super::{Intent, PairSnapshot, Strategy, StrategySettings};

/// Complete-set strategy (`pairedtrading`).
pub struct CompleteSetStrategy {
    settings: StrategySettings,
    market: Market,
    position: PairedPosition,
    last_intent_at_ms: i64,
}

impl CompleteSetStrategy {
    #[must_use]
    pub fn new(settings: StrategySettings, market: Market) -> Self {
        Self {
            settings,
            market,
            position: PairedPosition::new(),
            last_intent_at_ms: 0,
        }
    }

    fn select_intent(&mut self, snapshot: &PairSnapshot, now_ms: i64) -> Option<Intent> {
        if now_ms - self.last_intent_at_ms < self.settings.cooldown_ms {
            return None;
        }
        if now_ms / 1000 >= self.market.cycle_end() {
            return None;
        }

        let (yes, no) = (snapshot.yes?, snapshot.no?);
        if yes.ask.is_zero() || no.ask.is_zero() {
            return None;
        }

        let combined = yes.ask.pips() + no.ask.pips();
        let threshold = Pips::ONE.pips() - self.settings.arb_profit_threshold_pips;
        if combined > threshold {
            return None;
        }

        // Inventory cap: sets held = the lesser leg.
        let sets_held = self
            .position
            .shares(Outcome::Yes)
            .min(self.position.shares(Outcome::No));
        if sets_held >= self.settings.base_target {
            return None;
        }

        let size = (self.settings.base_target - sets_held).min(self.settings.build_lot_size);
        if size <= Decimal::ZERO {
            return None;
        }

        debug!(
            strategy = super::COMPLETE_SET_ID,
            market = %self.market.slug(),
            combined_pips = combined,
            size = %size,
            "Discounted complete set"
        );

        self.last_intent_at_ms = now_ms;
        Some(Intent::BuyPair {
            size,
            yes_limit: yes.ask.saturating_add(self.settings.max_slippage),
            no_limit: no.ask.saturating_add(self.settings.max_slippage),
        })
    }
}

impl Strategy for CompleteSetStrategy {
    fn id(&self) -> &'static str {
        super::COMPLETE_SET_ID
    }

    fn market(&self) -> &Market {
        &self.market
    }

    fn on_prices(&mut self, snapshot: &PairSnapshot, now_ms: i64) -> Vec<Intent> {
        self.select_intent(snapshot, now_ms).into_iter().collect()
    }

    fn on_order_update(&mut self, update: &OrderUpdate, _now_ms: i64) -> Vec<Intent> {
        if !matches!(
            update.status,
            OrderStatus::PartiallyFilled | OrderStatus::Filled
        ) {
            return Vec::new();
        }
        let Some(outcome) = self.market.outcome_of(&update.token_id) else {
            return Vec::new();
        };
        let Some(price) = update.price else {
            return Vec::new();
        };

        self.position.record_fill(
            outcome,
            update.size_matched,
            update.size_matched * price.to_decimal(),
        );
        Vec::new()
    }

    fn position(&self) -> PairedPosition {
        self.position
    }
}
