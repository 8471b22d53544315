//! Closed-form effective prices and the long-arbitrage round.

use rust_decimal_macros::dec;

use updown::core::domain::{check_arbitrage, EffectivePrices};
use updown::core::service::{assess_quality, QualityReason};
use updown::core::strategy::{arb::LongArbStrategy, Intent, Strategy, StrategySettings};
use updown::testkit::domain::{quarter_hour_market, snapshot, top_of_book};

#[test]
fn effective_prices_closed_form() {
    let book = top_of_book(5_500, 5_600, 4_700, 4_800);
    let eff = EffectivePrices::from_book(&book);

    assert_eq!(eff.buy_yes.pips(), 5_300);
    assert_eq!(eff.buy_no.pips(), 4_500);
    assert_eq!(eff.sell_yes.pips(), 5_500);
    assert_eq!(eff.sell_no.pips(), 4_700);
}

#[test]
fn arbitrage_detection_closed_form() {
    let book = top_of_book(5_200, 4_900, 5_200, 4_900);
    let opportunity = check_arbitrage(&book).expect("long arb");

    assert_eq!(opportunity.profit_pips, 400);
}

#[test]
fn long_arb_round_buys_both_legs_once() {
    // Sum of asks 96c against a 3c threshold: one complete set at the
    // effective 48c per leg, then silence for the cooldown window.
    let mut strategy = LongArbStrategy::new(StrategySettings::default(), quarter_hour_market());
    let snap = snapshot((4_700, 4_800), (4_700, 4_800));

    let intents = strategy.on_prices(&snap, 10_000);
    assert_eq!(intents.len(), 1);
    let Intent::BuyPair {
        size,
        yes_limit,
        no_limit,
    } = &intents[0]
    else {
        panic!("expected buy_pair, got {:?}", intents[0]);
    };
    assert_eq!(*size, dec!(1));
    assert_eq!(yes_limit.pips(), 4_800);
    assert_eq!(no_limit.pips(), 4_800);

    // Within the 1 s cooldown: no further orders.
    assert!(strategy.on_prices(&snap, 10_500).is_empty());
    assert!(strategy.on_prices(&snap, 10_900).is_empty());
    assert_eq!(strategy.on_prices(&snap, 11_100).len(), 1);
}

#[test]
fn quality_gate_blocks_thin_arbitrage() {
    let mut book = top_of_book(5_200, 4_900, 5_200, 4_900);
    book.yes_ask_size = dec!(0.5);

    let quality = assess_quality(&book, book.taken_at + 1, dec!(5), 10);
    assert_eq!(quality.reason, QualityReason::ThinBook);
    assert!(!quality.is_tradable(60));
}
