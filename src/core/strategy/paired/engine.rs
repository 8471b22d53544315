//! Phase-based paired-trading engine.
//!
//! Builds both legs while prices are undecided, locks the pair so every
//! resolution pays out, then amplifies the stronger leg. Exactly one
//! intent is selected per step; the runtime chunks and submits it under
//! the in-flight limit, and deferred demand is re-derived from position
//! state on the next tick.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::core::domain::{Market, Outcome, PairedPosition};
use crate::core::service::{OrderStatus, OrderUpdate};

use super::super::{Intent, PairSnapshot, Quote, Strategy, StrategySettings};
use super::phase::{Phase, PhaseClock};

/// Phase-based paired strategy (`paired_trading`).
pub struct PairedStrategy {
    settings: StrategySettings,
    market: Market,
    position: PairedPosition,
    clock: PhaseClock,
    /// Last observed snapshot, for tick-driven decisions between prints.
    last_snapshot: PairSnapshot,
    /// Alternates amplify purchases with insurance on the weak leg.
    amplify_flip: bool,
    last_intent_at_ms: i64,
}

impl PairedStrategy {
    #[must_use]
    pub fn new(settings: StrategySettings, market: Market) -> Self {
        let clock = PhaseClock {
            build_end_secs: settings.build_end_secs,
            amplify_start_secs: settings.amplify_start_secs,
            early_lock_price: settings.early_lock_price,
            early_amplify_price: settings.early_amplify_price,
        };
        Self {
            settings,
            market,
            position: PairedPosition::new(),
            clock,
            last_snapshot: PairSnapshot::default(),
            amplify_flip: false,
            last_intent_at_ms: 0,
        }
    }

    /// Select at most one intent for this step.
    fn select_intent(&mut self, snapshot: &PairSnapshot, now_ms: i64) -> Option<Intent> {
        if now_ms - self.last_intent_at_ms < self.settings.cooldown_ms {
            return None;
        }

        let elapsed = self.market.elapsed(now_ms / 1000);
        if elapsed < 0 || now_ms / 1000 >= self.market.cycle_end() {
            return None; // outside the cycle
        }

        let phase = self
            .clock
            .phase_at(elapsed, snapshot.max_bid(), self.position.is_locked());

        let intent = match phase {
            Phase::Build => self.build_intent(snapshot),
            Phase::Lock => self.lock_intent(snapshot),
            // An unlocked pair keeps working the lock rules even inside
            // the amplify window.
            Phase::Amplify if self.position.is_locked() => self.amplify_intent(snapshot),
            Phase::Amplify => self.lock_intent(snapshot),
        };

        if let Some(ref intent) = intent {
            debug!(
                strategy = PairedStrategy::ID,
                market = %self.market.slug(),
                phase = phase.as_str(),
                intent = intent.kind(),
                size = %intent.size(),
                "Intent selected"
            );
            self.last_intent_at_ms = now_ms;
        }
        intent
    }

    /// Build phase: accumulate the lighter leg toward the base target
    /// while its price stays under the build threshold.
    fn build_intent(&self, snapshot: &PairSnapshot) -> Option<Intent> {
        let target = self.settings.base_target;

        // Lighter leg first keeps the pair roughly balanced.
        let mut legs = [Outcome::Yes, Outcome::No];
        if self.position.shares(Outcome::No) < self.position.shares(Outcome::Yes) {
            legs.swap(0, 1);
        }

        for outcome in legs {
            if self.position.shares(outcome) >= target {
                continue;
            }
            let Some(quote) = snapshot.quote(outcome) else {
                continue;
            };
            if quote.ask.is_zero() || quote.ask >= self.settings.build_threshold {
                continue;
            }

            let remaining = target - self.position.shares(outcome);
            let size = remaining.min(self.settings.build_lot_size);
            return self.sized_intent(outcome, size, quote, IntentShape::Build);
        }
        None
    }

    /// Lock phase priorities: clear negative projections, then cheap
    /// insurance at extremes, then equalize the legs.
    fn lock_intent(&self, snapshot: &PairSnapshot) -> Option<Intent> {
        // 1. A leg projecting worse than -lock_threshold gets bought up to
        //    breakeven, capped at two lots per step.
        for outcome in [Outcome::Yes, Outcome::No] {
            if self.position.profit_if_wins(outcome) >= -self.settings.lock_threshold {
                continue;
            }
            let Some(quote) = snapshot.quote(outcome) else {
                continue;
            };
            if quote.ask.is_zero() {
                continue;
            }

            let deficit = self.position.deficit(outcome);
            let cap = self.settings.build_lot_size * Decimal::TWO;
            let size = deficit.min(cap);
            return self.sized_intent(outcome, size, quote, IntentShape::LockRisk);
        }

        // 2. Insurance: an ask at an extreme discount is cheap certainty.
        for outcome in [Outcome::Yes, Outcome::No] {
            let Some(quote) = snapshot.quote(outcome) else {
                continue;
            };
            if quote.ask.is_zero() || quote.ask > self.settings.insurance_price {
                continue;
            }
            if self.position.profit_if_wins(outcome) > Decimal::ZERO {
                continue;
            }
            return self.sized_intent(
                outcome,
                self.settings.build_lot_size,
                quote,
                IntentShape::Insurance,
            );
        }

        // 3. Equalize: close a share imbalance wider than one lot.
        let imbalance =
            self.position.shares(Outcome::Yes) - self.position.shares(Outcome::No);
        if imbalance.abs() > self.settings.build_lot_size {
            let outcome = if imbalance > Decimal::ZERO {
                Outcome::No
            } else {
                Outcome::Yes
            };
            let quote = snapshot.quote(outcome)?;
            if !quote.ask.is_zero() && quote.ask < self.settings.build_threshold {
                return self.sized_intent(
                    outcome,
                    imbalance.abs().min(self.settings.build_lot_size),
                    quote,
                    IntentShape::Build,
                );
            }
        }

        None
    }

    /// Amplify phase: lean into the stronger leg, alternating with a
    /// small insurance purchase on the other. Callers gate on lock.
    fn amplify_intent(&mut self, snapshot: &PairSnapshot) -> Option<Intent> {
        let stronger = self.position.stronger_leg();
        let (outcome, shape, size) = if self.amplify_flip {
            (
                stronger.opposite(),
                IntentShape::Insurance,
                self.settings.build_lot_size / Decimal::TWO,
            )
        } else {
            (stronger, IntentShape::Amplify, self.settings.build_lot_size)
        };

        let quote = snapshot.quote(outcome)?;
        if quote.ask.is_zero() {
            return None;
        }

        let intent = self.sized_intent(outcome, size, quote, shape);
        if intent.is_some() {
            self.amplify_flip = !self.amplify_flip;
        }
        intent
    }

    /// Apply slippage cap and the auto size adjustment, then shape the
    /// intent.
    fn sized_intent(
        &self,
        outcome: Outcome,
        size: Decimal,
        quote: Quote,
        shape: IntentShape,
    ) -> Option<Intent> {
        if size <= Decimal::ZERO {
            return None;
        }

        let limit = quote.ask.saturating_add(self.settings.max_slippage);

        // Bump undersized notionals when permitted, refusing absurd bumps.
        let mut size = size;
        let notional = size * quote.ask.to_decimal();
        if notional < self.settings.min_order_usdc {
            if !self.settings.auto_adjust_size {
                return None;
            }
            let adjusted = (self.settings.min_order_usdc / quote.ask.to_decimal())
                .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToPositiveInfinity);
            if adjusted / size > self.settings.max_size_adjust_ratio {
                debug!(
                    outcome = outcome.as_str(),
                    requested = %size,
                    adjusted = %adjusted,
                    "Size adjustment ratio exceeded, skipping intent"
                );
                return None;
            }
            size = adjusted;
        }

        Some(match shape {
            IntentShape::Build => Intent::Build {
                outcome,
                size,
                limit,
            },
            IntentShape::LockRisk => Intent::LockRisk {
                outcome,
                size,
                limit,
            },
            IntentShape::Insurance => Intent::Insurance {
                outcome,
                size,
                limit,
            },
            IntentShape::Amplify => Intent::Amplify {
                outcome,
                size,
                limit,
            },
        })
    }

    const ID: &'static str = super::PHASE_ID;
}

/// Which intent variant to shape; keeps the sizing logic in one place.
#[derive(Debug, Clone, Copy)]
enum IntentShape {
    Build,
    LockRisk,
    Insurance,
    Amplify,
}

impl Strategy for PairedStrategy {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn market(&self) -> &Market {
        &self.market
    }

    fn on_prices(&mut self, snapshot: &PairSnapshot, now_ms: i64) -> Vec<Intent> {
        self.last_snapshot = *snapshot;
        self.select_intent(snapshot, now_ms).into_iter().collect()
    }

    fn on_order_update(&mut self, update: &OrderUpdate, _now_ms: i64) -> Vec<Intent> {
        // Fills move the position; placements and cancels do not.
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

        let shares = update.size_matched;
        let cost = shares * price.to_decimal();
        self.position.record_fill(outcome, shares, cost);

        info!(
            strategy = Self::ID,
            market = %self.market.slug(),
            outcome = outcome.as_str(),
            shares = %shares,
            cost = %cost,
            locked = self.position.is_locked(),
            "Position updated"
        );
        Vec::new()
    }

    fn on_tick(&mut self, now_ms: i64) -> Vec<Intent> {
        // Deferred chunks and deadline pressure both resolve here: the
        // intent re-derives from current position state.
        let snapshot = self.last_snapshot;
        self.select_intent(&snapshot, now_ms).into_iter().collect()
    }

    fn position(&self) -> PairedPosition {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Pips, TokenId};
    use rust_decimal_macros::dec;

    fn pips(p: u32) -> Pips {
        Pips::new(p).unwrap()
    }

    fn quote(bid: u32, ask: u32) -> Quote {
        Quote {
            bid: pips(bid),
            ask: pips(ask),
        }
    }

    fn snapshot(yes: (u32, u32), no: (u32, u32)) -> PairSnapshot {
        PairSnapshot {
            yes: Some(quote(yes.0, yes.1)),
            no: Some(quote(no.0, no.1)),
        }
    }

    fn market() -> Market {
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
        )
    }

    fn strategy() -> PairedStrategy {
        let mut settings = StrategySettings::default();
        settings.cooldown_ms = 0;
        PairedStrategy::new(settings, market())
    }

    /// now_ms for a given number of seconds into the cycle.
    fn at(elapsed_secs: i64) -> i64 {
        (1_700_000_000 + elapsed_secs) * 1000
    }

    fn fill(strategy: &mut PairedStrategy, outcome: Outcome, shares: Decimal, cost: Decimal) {
        strategy.position.record_fill(outcome, shares, cost);
    }

    #[test]
    fn build_phase_accumulates_lighter_leg() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(4), dec!(2));

        let intents = s.on_prices(&snapshot((4_400, 4_500), (5_400, 5_500)), at(60));

        assert_eq!(intents.len(), 1);
        let Intent::Build { outcome, size, .. } = &intents[0] else {
            panic!("expected build, got {:?}", intents[0]);
        };
        assert_eq!(*outcome, Outcome::No);
        assert_eq!(*size, dec!(2));
    }

    #[test]
    fn build_respects_price_threshold() {
        let mut s = strategy();
        // Both asks above the 0.60 build threshold: nothing to build.
        let intents = s.on_prices(&snapshot((6_400, 6_500), (6_400, 6_500)), at(60));
        assert!(intents.is_empty());
    }

    #[test]
    fn lock_phase_buys_into_negative_projection() {
        let mut s = strategy();
        // q_yes=10, c_yes=5: profit_if_no_win = -5, below the -3 gate.
        fill(&mut s, Outcome::Yes, dec!(10), dec!(5));

        let intents = s.on_prices(&snapshot((5_400, 5_500), (4_400, 4_500)), at(400));

        assert_eq!(intents.len(), 1);
        let Intent::LockRisk { outcome, size, .. } = &intents[0] else {
            panic!("expected lock_risk, got {:?}", intents[0]);
        };
        assert_eq!(*outcome, Outcome::No);
        // Deficit is (c_yes + c_no) - q_no = 5, capped at 2 lots = 4.
        assert_eq!(*size, dec!(4));
    }

    #[test]
    fn lock_risk_cap_is_two_lots() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(40), dec!(20));

        let intents = s.on_prices(&snapshot((5_400, 5_500), (4_400, 4_500)), at(400));
        let Intent::LockRisk { size, .. } = &intents[0] else {
            panic!("expected lock_risk");
        };
        assert_eq!(*size, dec!(4)); // 2 x build_lot_size
    }

    #[test]
    fn lock_phase_takes_cheap_insurance() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(4), dec!(2));
        fill(&mut s, Outcome::No, dec!(4), dec!(2.2));

        // NO ask collapsed to 0.04: cheap insurance while its projection
        // is not yet positive.
        let intents = s.on_prices(&snapshot((9_300, 9_500), (300, 400)), at(400));

        assert_eq!(intents.len(), 1);
        assert!(matches!(
            intents[0],
            Intent::Insurance {
                outcome: Outcome::No,
                ..
            }
        ));
    }

    #[test]
    fn amplify_requires_lock() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(10), dec!(5));

        let intents = s.on_prices(&snapshot((5_400, 5_500), (4_400, 4_500)), at(700));
        // Unlocked in amplify window: the engine must not amplify. (The
        // lock-risk rule still fires because the NO projection is -5.)
        assert!(!intents
            .iter()
            .any(|i| matches!(i, Intent::Amplify { .. })));
    }

    #[test]
    fn amplify_leans_into_stronger_leg() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(12), dec!(4.5));
        fill(&mut s, Outcome::No, dec!(10), dec!(4.5));

        let intents = s.on_prices(&snapshot((5_400, 5_500), (4_400, 4_500)), at(700));

        assert_eq!(intents.len(), 1);
        let Intent::Amplify { outcome, .. } = &intents[0] else {
            panic!("expected amplify, got {:?}", intents[0]);
        };
        assert_eq!(*outcome, Outcome::Yes);
    }

    #[test]
    fn amplify_alternates_with_insurance() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(12), dec!(4.5));
        fill(&mut s, Outcome::No, dec!(10), dec!(4.5));
        let snap = snapshot((5_400, 5_500), (4_400, 4_500));

        let first = s.on_prices(&snap, at(700));
        let second = s.on_prices(&snap, at(701));

        assert!(matches!(first[0], Intent::Amplify { .. }));
        assert!(matches!(
            second[0],
            Intent::Insurance {
                outcome: Outcome::No,
                ..
            }
        ));
    }

    #[test]
    fn early_lock_transition_on_extreme_price() {
        let mut s = strategy();
        fill(&mut s, Outcome::Yes, dec!(2), dec!(1));
        fill(&mut s, Outcome::No, dec!(2), dec!(1));

        // Only 60s in, but YES bid pinned at 0.86: build is over. With a
        // balanced position and no deficit beyond the gate, no intent.
        let intents = s.on_prices(&snapshot((8_600, 8_700), (1_200, 1_300)), at(60));
        assert!(!intents
            .iter()
            .any(|i| matches!(i, Intent::Build { .. })));
    }

    #[test]
    fn fills_move_position_through_order_updates() {
        use crate::core::domain::OrderId;
        let mut s = strategy();

        let update = OrderUpdate {
            order_id: OrderId::new("o1"),
            token_id: TokenId::from("111"),
            market: None,
            side: None,
            price: Some(pips(4_500)),
            size_matched: dec!(2),
            status: OrderStatus::Filled,
        };
        s.on_order_update(&update, at(10));

        assert_eq!(s.position().shares(Outcome::Yes), dec!(2));
        assert_eq!(s.position().cost(Outcome::Yes), dec!(0.9));
    }

    #[test]
    fn cooldown_suppresses_back_to_back_intents() {
        let mut settings = StrategySettings::default();
        settings.cooldown_ms = 1_000;
        let mut s = PairedStrategy::new(settings, market());

        let snap = snapshot((4_400, 4_500), (5_300, 5_400));
        assert_eq!(s.on_prices(&snap, at(60)).len(), 1);
        // 300ms later: still cooling down.
        assert!(s.on_prices(&snap, at(60) + 300).is_empty());
    }

    #[test]
    fn outside_cycle_is_quiet() {
        let mut s = strategy();
        let snap = snapshot((4_400, 4_500), (5_300, 5_400));
        assert!(s.on_prices(&snap, at(-10)).is_empty());
        assert!(s.on_prices(&snap, at(901)).is_empty());
    }
}
