//! Order quantization and signed-order construction.
//!
//! The exchange only matches orders whose legs snap to its price tick and
//! lot size: the stablecoin leg carries two decimals and the share leg
//! four (in six-decimal base units). Undersized orders are bumped up to
//! the exchange minimums rather than rejected locally.

use alloy_primitives::U256;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::domain::{OrderArgs, Pips, Side, SignedOrder};
use crate::error::{Error, ExchangeReject, Result};

use super::signing::{OrderSigner, UnsignedOrder};

/// Exchange price tick in pips (one cent).
pub const PRICE_TICK_PIPS: u32 = 100;

/// Minimum share size accepted by the exchange.
pub const MIN_SHARE_SIZE: Decimal = dec!(0.1);

/// Minimum stablecoin notional on BUY orders.
pub const MIN_BUY_NOTIONAL: Decimal = dec!(1.00);

/// Share sizes tried when the exchange rejects an order as too small.
pub const SIZE_BUMPS: [Decimal; 4] = [dec!(1.0), dec!(2.0), dec!(5.0), dec!(10.0)];

/// A quantized order: legs snapped to the exchange grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedOrder {
    pub price: Pips,
    /// Size in native shares, two decimals.
    pub size: Decimal,
    /// Stablecoin leg, six-decimal base units, two-decimal aligned.
    pub usdc_units: u64,
    /// Share leg, six-decimal base units, four-decimal aligned.
    pub share_units: u64,
}

/// Apply tick/lot rounding and the share-size floor to an order request.
///
/// The stablecoin notional floor is NOT applied here: the fast path
/// submits at the requested size and lets the exchange's own rejection
/// drive the bump loop. See [`quantize_with_minimums`] for the
/// FOK-precision path.
///
/// # Errors
///
/// Returns [`ExchangeReject::InvalidPrice`] when the price quantizes to
/// zero or one, where no order can rest.
pub fn quantize(args: &OrderArgs) -> Result<QuantizedOrder> {
    let price = args.price.round_to_tick(PRICE_TICK_PIPS);
    if price.is_zero() || price == Pips::ONE {
        return Err(ExchangeReject::InvalidPrice(format!(
            "price {} quantizes outside the open interval",
            args.price
        ))
        .into());
    }

    // Two-decimal lot size, minimum 0.1 shares.
    let size = args
        .size
        .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .max(MIN_SHARE_SIZE);

    finish_quantize(args.side, price, size)
}

/// Quantize and additionally enforce the BUY notional floor, recomputing
/// the size upward so `size * price >= MIN_BUY_NOTIONAL`. Used by the
/// FOK/FAK paths, which the exchange rejects outright on undersized
/// notionals.
///
/// # Errors
///
/// Same contract as [`quantize`].
pub fn quantize_with_minimums(args: &OrderArgs) -> Result<QuantizedOrder> {
    let q = quantize(args)?;

    if args.side == Side::Buy {
        let notional = q.size * q.price.to_decimal();
        if notional < MIN_BUY_NOTIONAL {
            let size = (MIN_BUY_NOTIONAL / q.price.to_decimal())
                .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToPositiveInfinity);
            return finish_quantize(args.side, q.price, size);
        }
    }

    Ok(q)
}

fn finish_quantize(side: Side, price: Pips, size: Decimal) -> Result<QuantizedOrder> {
    let share_units = to_base_units(size)?;

    // Stablecoin leg snapped to two decimals: up for BUY (never underpay
    // the cross), down for SELL (never overstate the proceeds).
    let notional = size * price.to_decimal();
    let usdc = match side {
        Side::Buy => {
            notional.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToPositiveInfinity)
        }
        Side::Sell => notional.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::ToZero),
    };
    let usdc_units = to_base_units(usdc)?;

    Ok(QuantizedOrder {
        price,
        size,
        usdc_units,
        share_units,
    })
}

fn to_base_units(value: Decimal) -> Result<u64> {
    (value * dec!(1_000_000))
        .trunc()
        .to_u64()
        .ok_or_else(|| Error::Strategy(format!("amount {value} does not fit in base units")))
}

/// Builds fully signed orders from strategy requests.
pub struct OrderBuilder {
    signer: OrderSigner,
    fee_rate_bps: u32,
}

impl OrderBuilder {
    #[must_use]
    pub fn new(signer: OrderSigner) -> Self {
        Self {
            signer,
            fee_rate_bps: 0,
        }
    }

    /// Fee rate applied to new orders; fetched per token family.
    #[must_use]
    pub fn with_fee_rate_bps(mut self, bps: u32) -> Self {
        self.fee_rate_bps = bps;
        self
    }

    #[must_use]
    pub fn signer(&self) -> &OrderSigner {
        &self.signer
    }

    /// Quantize, hash, and sign an order request at the requested size.
    ///
    /// # Errors
    ///
    /// Propagates quantization rejects and signing failures.
    pub fn build(&self, args: &OrderArgs) -> Result<SignedOrder> {
        let quantized = quantize(args)?;
        self.build_quantized(args, quantized)
    }

    /// Build with the FOK-precision minimums applied (notional floor).
    ///
    /// # Errors
    ///
    /// Propagates quantization rejects and signing failures.
    pub fn build_with_minimums(&self, args: &OrderArgs) -> Result<SignedOrder> {
        let quantized = quantize_with_minimums(args)?;
        self.build_quantized(args, quantized)
    }

    /// Build at an explicit size, for the bump-retry loop.
    ///
    /// # Errors
    ///
    /// Propagates quantization rejects and signing failures.
    pub fn build_with_size(&self, args: &OrderArgs, size: Decimal) -> Result<SignedOrder> {
        let mut resized = args.clone();
        resized.size = size;
        self.build(&resized)
    }

    fn build_quantized(&self, args: &OrderArgs, q: QuantizedOrder) -> Result<SignedOrder> {
        // BUY: maker leg is stablecoin, taker leg is shares. SELL: reversed.
        let (maker_amount, taker_amount) = match args.side {
            Side::Buy => (q.usdc_units, q.share_units),
            Side::Sell => (q.share_units, q.usdc_units),
        };

        let token_id = U256::from_str_radix(args.token_id.as_str(), 10)
            .map_err(|e| Error::Decode(format!("token id {}: {e}", args.token_id)))?;

        let unsigned = UnsignedOrder {
            salt: generate_salt(),
            token_id,
            maker_amount,
            taker_amount,
            expiration: 0,
            nonce: 0,
            fee_rate_bps: self.fee_rate_bps,
            side: args.side,
        };

        let digest = self.signer.digest(&unsigned, args.neg_risk);
        let signature = self.signer.sign(digest)?;

        Ok(SignedOrder {
            salt: unsigned.salt,
            maker: format!("{:?}", self.signer.maker()),
            signer: format!("{:?}", self.signer.address()),
            taker: format!("{:?}", alloy_primitives::Address::ZERO),
            token_id: args.token_id.to_string(),
            maker_amount: maker_amount.to_string(),
            taker_amount: taker_amount.to_string(),
            expiration: "0".into(),
            nonce: "0".into(),
            fee_rate_bps: self.fee_rate_bps.to_string(),
            side: args.side,
            signature_type: self.signer.signature_type().as_u8(),
            signature: format!("0x{}", hex::encode(signature)),
        })
    }
}

/// Sizes to try after a minimum-order rejection, strictly above the
/// requested size, largest last.
#[must_use]
pub fn bump_sequence(requested: Decimal) -> Vec<Decimal> {
    SIZE_BUMPS
        .iter()
        .copied()
        .filter(|&bump| bump > requested)
        .collect()
}

/// Random salt masked to 2^53 - 1; the backend parses it as an IEEE 754
/// double.
fn generate_salt() -> u64 {
    rand::thread_rng().gen::<u64>() & ((1 << 53) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SignatureType;

    const TEST_KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567890123";

    fn builder() -> OrderBuilder {
        OrderBuilder::new(
            OrderSigner::from_private_key(TEST_KEY, None, SignatureType::Eoa).unwrap(),
        )
    }

    fn args(side: Side, size: Decimal, price_pips: u32) -> OrderArgs {
        OrderArgs::new("777", side, size, Pips::new(price_pips).unwrap())
    }

    // -----------------------------------------------------------------------
    // Quantization
    // -----------------------------------------------------------------------

    #[test]
    fn price_snaps_to_tick() {
        let q = quantize(&args(Side::Buy, dec!(10), 4_567)).unwrap();
        assert_eq!(q.price.pips(), 4_500);
    }

    #[test]
    fn legs_align_to_exchange_grid() {
        let q = quantize(&args(Side::Buy, dec!(3.333), 4_500)).unwrap();

        // Stablecoin leg: two decimals. Share leg: four decimals.
        assert_eq!(q.usdc_units % 10_000, 0);
        assert_eq!(q.share_units % 100, 0);
    }

    #[test]
    fn tiny_sizes_bump_to_min_share() {
        let q = quantize(&args(Side::Sell, dec!(0.01), 5_000)).unwrap();
        assert_eq!(q.size, dec!(0.1));
    }

    #[test]
    fn buy_notional_floor_recomputes_size() {
        // 0.5 shares at $0.40 is $0.20 notional; the bump must reach $1.00
        // with the size rounded up to the next hundredth.
        let q = quantize_with_minimums(&args(Side::Buy, dec!(0.5), 4_000)).unwrap();

        assert_eq!(q.size, dec!(2.5));
        assert!(q.size * q.price.to_decimal() >= MIN_BUY_NOTIONAL);
        assert_eq!(q.usdc_units, 1_000_000);
    }

    #[test]
    fn fast_path_keeps_requested_size() {
        // The fast path submits undersized BUYs as-is; the exchange's
        // rejection drives the bump loop instead.
        let q = quantize(&args(Side::Buy, dec!(0.3), 1_000)).unwrap();
        assert_eq!(q.size, dec!(0.3));
    }

    #[test]
    fn sell_orders_skip_notional_floor() {
        let q = quantize_with_minimums(&args(Side::Sell, dec!(0.5), 4_000)).unwrap();
        assert_eq!(q.size, dec!(0.5));
    }

    #[test]
    fn degenerate_prices_rejected() {
        assert!(quantize(&args(Side::Buy, dec!(1), 50)).is_err());
        assert!(quantize(&args(Side::Buy, dec!(1), 10_000)).is_err());
    }

    // -----------------------------------------------------------------------
    // Signed order construction
    // -----------------------------------------------------------------------

    #[test]
    fn buy_assigns_usdc_to_maker_leg() {
        let order = builder().build(&args(Side::Buy, dec!(2), 4_500)).unwrap();

        assert_eq!(order.maker_amount, "900000");
        assert_eq!(order.taker_amount, "2000000");
        assert_eq!(order.side, Side::Buy);
    }

    #[test]
    fn sell_reverses_legs() {
        let order = builder().build(&args(Side::Sell, dec!(2), 4_500)).unwrap();

        assert_eq!(order.maker_amount, "2000000");
        assert_eq!(order.taker_amount, "900000");
    }

    #[test]
    fn salt_fits_ieee_754() {
        for _ in 0..32 {
            assert!(generate_salt() < (1 << 53));
        }
    }

    #[test]
    fn signature_is_65_bytes_hex() {
        let order = builder().build(&args(Side::Buy, dec!(2), 4_500)).unwrap();
        let raw = hex::decode(order.signature.trim_start_matches("0x")).unwrap();
        assert_eq!(raw.len(), 65);
        assert!(raw[64] == 27 || raw[64] == 28);
    }

    // -----------------------------------------------------------------------
    // Bump sequence
    // -----------------------------------------------------------------------

    #[test]
    fn bump_sequence_skips_at_or_below_requested() {
        assert_eq!(
            bump_sequence(dec!(0.3)),
            vec![dec!(1.0), dec!(2.0), dec!(5.0), dec!(10.0)]
        );
        assert_eq!(bump_sequence(dec!(2.0)), vec![dec!(5.0), dec!(10.0)]);
        assert!(bump_sequence(dec!(10.0)).is_empty());
    }
}
