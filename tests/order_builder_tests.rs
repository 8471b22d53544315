//! Order precision and signature invariants across a grid of requests.

use alloy_primitives::Signature;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use updown::core::domain::{OrderArgs, Pips, Side, SignatureType};
use updown::core::exchange::builder::{quantize, quantize_with_minimums};
use updown::core::exchange::signing::UnsignedOrder;
use updown::core::exchange::{OrderBuilder, OrderSigner};

const TEST_KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567890123";

fn builder() -> OrderBuilder {
    OrderBuilder::new(OrderSigner::from_private_key(TEST_KEY, None, SignatureType::Eoa).unwrap())
}

fn args(side: Side, size: Decimal, price_pips: u32) -> OrderArgs {
    OrderArgs::new("777", side, size, Pips::new(price_pips).unwrap())
}

#[test]
fn every_order_lands_on_the_exchange_grid() {
    let sizes = [dec!(0.1), dec!(0.37), dec!(1), dec!(2.5), dec!(7.77), dec!(100)];
    let prices = [100u32, 1_200, 4_500, 5_000, 6_700, 9_900];

    for &size in &sizes {
        for &price in &prices {
            for side in [Side::Buy, Side::Sell] {
                let q = quantize_with_minimums(&args(side, size, price)).unwrap();

                // Stablecoin leg: two decimals in six-decimal units.
                assert_eq!(
                    q.usdc_units % 10_000,
                    0,
                    "usdc {} not 2-decimal for size={size} price={price}",
                    q.usdc_units
                );
                // Share leg: four decimals in six-decimal units.
                assert_eq!(
                    q.share_units % 100,
                    0,
                    "shares {} not 4-decimal for size={size} price={price}",
                    q.share_units
                );
                // Price snapped to the cent tick.
                assert_eq!(q.price.pips() % 100, 0);
            }
        }
    }
}

#[test]
fn buy_minimum_bump_reaches_the_notional_floor() {
    // 0.5 shares at $0.40 is a $0.20 notional.
    let q = quantize_with_minimums(&args(Side::Buy, dec!(0.5), 4_000)).unwrap();

    assert!(q.size * q.price.to_decimal() >= dec!(1.00));
    assert_eq!(q.size, dec!(2.5));

    // The bumped size is the smallest hundredth that clears the floor.
    let one_tick_less = q.size - dec!(0.01);
    assert!(one_tick_less * q.price.to_decimal() < dec!(1.00));
}

#[test]
fn fast_path_quantization_preserves_requested_size() {
    let q = quantize(&args(Side::Buy, dec!(0.3), 1_000)).unwrap();
    assert_eq!(q.size, dec!(0.3));
}

#[test]
fn signatures_recover_to_the_signer() {
    let signer = OrderSigner::from_private_key(TEST_KEY, None, SignatureType::Eoa).unwrap();

    for (salt, side) in [(1u64, Side::Buy), (2, Side::Sell), (3, Side::Buy)] {
        let unsigned = UnsignedOrder {
            salt,
            token_id: alloy_primitives::U256::from(777),
            maker_amount: 450_000,
            taker_amount: 1_000_000,
            expiration: 0,
            nonce: 0,
            fee_rate_bps: 0,
            side,
        };

        for neg_risk in [false, true] {
            let digest = signer.digest(&unsigned, neg_risk);
            let raw = signer.sign(digest).unwrap();

            assert!(raw[64] == 27 || raw[64] == 28);
            let recovered = Signature::from_raw(&raw)
                .unwrap()
                .recover_address_from_prehash(&digest)
                .unwrap();
            assert_eq!(recovered, signer.address());
        }
    }
}

#[test]
fn signed_orders_carry_wire_format_amounts() {
    let order = builder().build(&args(Side::Buy, dec!(2), 4_500)).unwrap();

    assert_eq!(order.maker_amount, "900000");
    assert_eq!(order.taker_amount, "2000000");
    assert!(order.signature.starts_with("0x"));
    assert_eq!(order.signature.len(), 2 + 65 * 2);
    assert!(order.salt < (1 << 53));
}
