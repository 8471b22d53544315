//! Paired-trading phase engine scenarios.

use rust_decimal_macros::dec;

use updown::core::domain::{OrderId, Outcome, Pips, TokenId};
use updown::core::service::{OrderStatus, OrderUpdate};
use updown::core::strategy::paired::engine::PairedStrategy;
use updown::core::strategy::{Intent, Strategy, StrategySettings};
use updown::testkit::domain::{quarter_hour_market, snapshot, PERIOD_START};

fn at(elapsed_secs: i64) -> i64 {
    (PERIOD_START + elapsed_secs) * 1000
}

fn settings() -> StrategySettings {
    let mut settings = StrategySettings::default();
    settings.cooldown_ms = 0;
    settings.build_lot_size = dec!(2.5);
    settings
}

fn fill(strategy: &mut PairedStrategy, token: &str, shares: rust_decimal::Decimal, price: Pips) {
    let update = OrderUpdate {
        order_id: OrderId::new("o"),
        token_id: TokenId::from(token),
        market: None,
        side: None,
        price: Some(price),
        size_matched: shares,
        status: OrderStatus::Filled,
    };
    strategy.on_order_update(&update, 0);
}

#[test]
fn lock_risk_trigger_buys_the_deficit() {
    // q_yes = 10 at a total cost of 5: profit_if_no_win = -5, past the
    // -3 lock threshold. The target is the full deficit of 5 shares,
    // within the 2-lot cap of 5.
    let mut strategy = PairedStrategy::new(settings(), quarter_hour_market());
    fill(&mut strategy, "111", dec!(10), Pips::new(5_000).unwrap());

    let intents = strategy.on_prices(&snapshot((5_400, 5_500), (4_400, 4_500)), at(400));

    assert_eq!(intents.len(), 1);
    let Intent::LockRisk { outcome, size, .. } = &intents[0] else {
        panic!("expected lock_risk, got {:?}", intents[0]);
    };
    assert_eq!(*outcome, Outcome::No);
    assert_eq!(*size, dec!(5));
}

#[test]
fn position_monotonicity_over_fill_sequences() {
    let mut strategy = PairedStrategy::new(settings(), quarter_hour_market());
    let fills = [
        (dec!(2), 4_500u32),
        (dec!(0.5), 4_800),
        (dec!(3.25), 5_100),
        (dec!(1), 4_400),
    ];

    let mut prev_shares = dec!(0);
    let mut prev_cost = dec!(0);
    let mut prev_profit = strategy.position().profit_if_wins(Outcome::Yes);

    for (shares, price_pips) in fills {
        fill(&mut strategy, "111", shares, Pips::new(price_pips).unwrap());
        let position = strategy.position();

        // Shares and cost never decrease.
        assert!(position.shares(Outcome::Yes) >= prev_shares);
        assert!(position.cost(Outcome::Yes) >= prev_cost);

        // The projection moves by no more than one fill's contribution.
        let profit = position.profit_if_wins(Outcome::Yes);
        let step = (profit - prev_profit).abs();
        assert!(step <= shares, "projection jumped {step} on a {shares} fill");

        prev_shares = position.shares(Outcome::Yes);
        prev_cost = position.cost(Outcome::Yes);
        prev_profit = profit;
    }
}

#[test]
fn full_cycle_reaches_lock_from_balanced_fills() {
    let mut strategy = PairedStrategy::new(settings(), quarter_hour_market());

    // Build both legs below 0.50: the pair locks.
    fill(&mut strategy, "111", dec!(10), Pips::new(4_500).unwrap());
    fill(&mut strategy, "222", dec!(10), Pips::new(4_500).unwrap());

    let position = strategy.position();
    assert!(position.is_locked());
    assert_eq!(position.profit_if_wins(Outcome::Yes), dec!(1));
    assert_eq!(position.profit_if_wins(Outcome::No), dec!(1));

    // Locked pair in the amplify window leans into a leg.
    let intents = strategy.on_prices(&snapshot((5_400, 5_500), (4_400, 4_500)), at(700));
    assert_eq!(intents.len(), 1);
    assert!(matches!(intents[0], Intent::Amplify { .. }));
}

#[test]
fn build_phase_alternates_legs_toward_target() {
    let mut strategy = PairedStrategy::new(settings(), quarter_hour_market());
    let snap = snapshot((4_400, 4_500), (5_300, 5_400));

    // First intent builds YES (equal legs, YES checked first).
    let first = strategy.on_prices(&snap, at(30));
    let Intent::Build { outcome, .. } = &first[0] else {
        panic!("expected build");
    };
    assert_eq!(*outcome, Outcome::Yes);

    // After a YES fill the lighter NO leg is next.
    fill(&mut strategy, "111", dec!(2.5), Pips::new(4_500).unwrap());
    let second = strategy.on_prices(&snap, at(60));
    let Intent::Build { outcome, .. } = &second[0] else {
        panic!("expected build");
    };
    assert_eq!(*outcome, Outcome::No);
}
