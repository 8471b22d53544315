//! Raw calldata decoding for exchange fill functions.
//!
//! Pending transactions are decoded straight off their 32-byte word grid
//! rather than through a generated ABI: the neg-risk adapter emits a
//! nonstandard "direct" encoding for its order arrays, so every parse is
//! validated against structural sanity checks (address padding, non-zero
//! token, amount range) and a failed check means "not decoded" rather
//! than a wrong trade.

use alloy_primitives::{Address, U256};

use crate::core::domain::Side;

use super::contracts::selector;

/// Words per order struct: salt, maker, signer, taker, tokenId,
/// makerAmount, takerAmount, expiration, nonce, feeRateBps, side,
/// signatureType.
pub const ORDER_WORDS: usize = 12;

const WORD: usize = 32;

/// Amount sanity range in six-decimal base units: 0.1 shares to 100k units.
pub const AMOUNT_MIN: u128 = 100_000;
pub const AMOUNT_MAX: u128 = 100_000_000_000;

/// Which fill function the calldata invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    FillOrders,
    FillOrder,
    MatchOrders,
}

/// One order read off the word grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOrder {
    pub salt: u128,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: U256,
    pub maker_amount: u128,
    pub taker_amount: u128,
    pub side: Side,
}

impl RawOrder {
    /// All addresses that could tie this order to a watched party.
    #[must_use]
    pub fn parties(&self) -> [Address; 3] {
        [self.maker, self.signer, self.taker]
    }
}

/// A decoded fill call: the taker order first, maker orders after it.
///
/// `fill_amounts` excludes the taker order; `fill_amounts[i]` belongs to
/// `orders[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    pub kind: CallKind,
    pub orders: Vec<RawOrder>,
    /// Taker fill in six-decimal stablecoin units.
    pub taker_fill_usdc: u128,
    /// Taker fill in six-decimal share units.
    pub taker_fill_shares: u128,
    pub fill_amounts: Vec<u128>,
}

/// Decode calldata for any supported fill function.
///
/// Returns `None` for unknown selectors or any structural sanity failure.
#[must_use]
pub fn decode(calldata: &[u8]) -> Option<DecodedCall> {
    let sel = calldata.get(..4)?;
    let body = calldata.get(4..)?;
    match <[u8; 4]>::try_from(sel).ok()? {
        selector::FILL_ORDERS => decode_fill_orders(body),
        selector::FILL_ORDER => decode_fill_order(body),
        selector::MATCH_ORDERS => decode_match_orders(body),
        _ => None,
    }
}

/// `fillOrders(orders[], fillAmounts[], takerFillUsdc, takerFillShares)`.
///
/// Word grid after the selector:
/// word 0 = offset to `orders[]`, word 1 = offset to `fillAmounts[]`,
/// word 2 = taker fill in stablecoin, word 3 = taker fill in shares,
/// word 4 = alternative `fillAmounts` offset used by some neg-risk
/// adapter encodings.
fn decode_fill_orders(body: &[u8]) -> Option<DecodedCall> {
    let orders_offset = word_usize(body, 0)?;
    let primary_fills = word_usize(body, 1);
    let taker_fill_usdc = word_u128(body, 2)?;
    let taker_fill_shares = word_u128(body, 3)?;
    let alt_fills = word_usize(body, 4);

    let orders = parse_order_array(body, orders_offset)?;
    if orders.is_empty() {
        return None;
    }

    in_sanity_range(taker_fill_shares).then_some(())?;

    // The per-maker fill array sits at whichever candidate offset yields
    // amounts in the sanity range. A single-order call legitimately has an
    // empty array.
    let fill_amounts = [primary_fills, alt_fills]
        .into_iter()
        .flatten()
        .find_map(|offset| parse_amount_array(body, offset, orders.len() - 1))
        .unwrap_or_default();

    Some(DecodedCall {
        kind: CallKind::FillOrders,
        orders,
        taker_fill_usdc,
        taker_fill_shares,
        fill_amounts,
    })
}

/// `fillOrder(order, fillAmount)`.
///
/// The order is reached through word 0's offset when one is present, or
/// sits inline starting at word 0 in the adapter's direct encoding.
fn decode_fill_order(body: &[u8]) -> Option<DecodedCall> {
    let (order, fill) = if let Some(order) =
        word_usize(body, 0).and_then(|offset| parse_order_at(body, offset))
    {
        (order, word_u128(body, 1)?)
    } else {
        (parse_order_at(body, 0)?, word_u128(body, ORDER_WORDS)?)
    };

    in_sanity_range(fill).then_some(())?;

    Some(DecodedCall {
        kind: CallKind::FillOrder,
        orders: vec![order],
        taker_fill_usdc: 0,
        taker_fill_shares: fill,
        fill_amounts: Vec::new(),
    })
}

/// `matchOrders(takerOrder, makerOrders[], takerFillUsdc, takerReceive, makerFillAmounts[])`.
///
/// Word 0 = offset to the taker order, word 1 = offset to the maker order
/// list, word 3 = taker receive amount, word 4 = `makerFillAmounts[]`.
fn decode_match_orders(body: &[u8]) -> Option<DecodedCall> {
    let taker_offset = word_usize(body, 0)?;
    let makers_offset = word_usize(body, 1)?;
    let taker_fill_usdc = word_u128(body, 2)?;
    let taker_fill_shares = word_u128(body, 3)?;
    let fills_offset = word_usize(body, 4);

    let taker_order = parse_order_at(body, taker_offset)?;
    let maker_orders = parse_order_array(body, makers_offset)?;

    in_sanity_range(taker_fill_shares).then_some(())?;

    let fill_amounts = fills_offset
        .and_then(|offset| parse_amount_array(body, offset, maker_orders.len()))
        .unwrap_or_default();

    let mut orders = Vec::with_capacity(1 + maker_orders.len());
    orders.push(taker_order);
    orders.extend(maker_orders);

    Some(DecodedCall {
        kind: CallKind::MatchOrders,
        orders,
        taker_fill_usdc,
        taker_fill_shares,
        fill_amounts,
    })
}

/// Parse an order array in either supported encoding.
///
/// Standard ABI: the offset lands on a length word followed by the
/// structs. Direct ABI (neg-risk adapter): the offset lands on the first
/// struct itself, and the length is inferred by scanning forward while
/// successive frames still look like orders.
fn parse_order_array(body: &[u8], offset: usize) -> Option<Vec<RawOrder>> {
    // Standard: a plausible length word, then each struct parses.
    if let Some(len) = word_u128(body, offset / WORD) {
        if len >= 1 && len <= 32 {
            let len = len as usize;
            let base = offset + WORD;
            let parsed: Vec<_> = (0..len)
                .map_while(|i| parse_order_at(body, base + i * ORDER_WORDS * WORD))
                .collect();
            if parsed.len() == len {
                return Some(parsed);
            }
        }
    }

    // Direct: scan 12-word frames from the offset itself.
    let mut orders = Vec::new();
    let mut cursor = offset;
    while let Some(order) = parse_order_at(body, cursor) {
        orders.push(order);
        cursor += ORDER_WORDS * WORD;
    }
    (!orders.is_empty()).then_some(orders)
}

/// Read one 12-word order frame at a byte offset, applying the
/// structural checks that keep garbage words from becoming trades.
fn parse_order_at(body: &[u8], offset: usize) -> Option<RawOrder> {
    if offset % WORD != 0 {
        return None;
    }
    let base = offset / WORD;

    let maker = word_address(body, base + 1)?;
    let signer = word_address(body, base + 2).unwrap_or(maker);
    let taker = word_address(body, base + 3).unwrap_or(Address::ZERO);

    let token_id = word_u256(body, base + 4)?;
    if token_id.is_zero() {
        return None;
    }

    let maker_amount = word_u128(body, base + 5)?;
    let taker_amount = word_u128(body, base + 6)?;
    if !in_sanity_range(maker_amount) || !in_sanity_range(taker_amount) {
        return None;
    }

    let side = Side::from_u8(u8::try_from(word_u128(body, base + 10)?).ok()?)?;

    Some(RawOrder {
        salt: word_u128(body, base)?,
        maker,
        signer,
        taker,
        token_id,
        maker_amount,
        taker_amount,
        side,
    })
}

/// Parse a `uint256[]` of fill amounts at a candidate offset.
///
/// Accepts the array only when the length matches the expected maker
/// count and every amount passes the sanity range; otherwise the offset
/// was not a fill array.
fn parse_amount_array(body: &[u8], offset: usize, expected: usize) -> Option<Vec<u128>> {
    if offset % WORD != 0 {
        return None;
    }
    let base = offset / WORD;
    let len = word_u128(body, base)?;
    if len as usize != expected || expected == 0 {
        return None;
    }

    let amounts: Vec<_> = (0..expected)
        .map_while(|i| word_u128(body, base + 1 + i))
        .filter(|&a| in_sanity_range(a))
        .collect();
    (amounts.len() == expected).then_some(amounts)
}

pub(crate) fn in_sanity_range(amount: u128) -> bool {
    (AMOUNT_MIN..=AMOUNT_MAX).contains(&amount)
}

fn word(body: &[u8], idx: usize) -> Option<&[u8]> {
    body.get(idx * WORD..(idx + 1) * WORD)
}

fn word_u256(body: &[u8], idx: usize) -> Option<U256> {
    word(body, idx).map(U256::from_be_slice)
}

fn word_u128(body: &[u8], idx: usize) -> Option<u128> {
    let w = word(body, idx)?;
    // Anything above 128 bits is never a sane amount, offset, or length.
    if w[..16].iter().any(|&b| b != 0) {
        return None;
    }
    Some(u128::from_be_bytes(w[16..].try_into().ok()?))
}

fn word_usize(body: &[u8], idx: usize) -> Option<usize> {
    usize::try_from(word_u128(body, idx)?).ok()
}

/// Address-layout check: first 12 bytes zero and at least 3 non-zero
/// bytes among the first 10 of the address itself. Rules out amounts and
/// short integers masquerading as addresses.
fn word_address(body: &[u8], idx: usize) -> Option<Address> {
    let w = word(body, idx)?;
    if w[..12].iter().any(|&b| b != 0) {
        return None;
    }
    let nonzero_high = w[12..22].iter().filter(|&&b| b != 0).count();
    if nonzero_high < 3 {
        return None;
    }
    Some(Address::from_slice(&w[12..]))
}
