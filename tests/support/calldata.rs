//! Builders for raw exchange calldata.
//!
//! Tests assemble `fillOrders`/`matchOrders` word grids the way the
//! contracts encode them, then feed the bytes through the decoder.

use alloy_primitives::Address;

use updown::core::domain::Side;

pub const ORDER_WORDS: usize = 12;
pub const FILL_ORDERS_SELECTOR: [u8; 4] = [0x22, 0x87, 0xe3, 0x50];

pub fn push_word_u128(buf: &mut Vec<u8>, value: u128) {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    buf.extend_from_slice(&word);
}

pub fn push_word_addr(buf: &mut Vec<u8>, addr: Address) {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    buf.extend_from_slice(&word);
}

/// One 12-word order frame.
pub fn push_order(
    buf: &mut Vec<u8>,
    maker: Address,
    token_id: u128,
    maker_amount: u128,
    taker_amount: u128,
    side: Side,
) {
    push_word_u128(buf, 42); // salt
    push_word_addr(buf, maker);
    push_word_addr(buf, maker); // signer
    push_word_addr(buf, Address::ZERO); // open taker
    push_word_u128(buf, token_id);
    push_word_u128(buf, maker_amount);
    push_word_u128(buf, taker_amount);
    push_word_u128(buf, 0); // expiration
    push_word_u128(buf, 0); // nonce
    push_word_u128(buf, 0); // feeRateBps
    push_word_u128(buf, u128::from(side.as_u8()));
    push_word_u128(buf, 0); // signatureType
}

/// Standard-ABI `fillOrders` calldata for two orders and one maker fill.
///
/// With `fills_at_alt_offset` the fill array is referenced from word 4
/// (the neg-risk adapter variant) and word 1 points nowhere useful.
pub fn fill_orders_two(
    taker_maker: Address,
    maker_maker: Address,
    taker_fill_shares: u128,
    maker_fill: u128,
    fills_at_alt_offset: bool,
) -> Vec<u8> {
    let mut body = Vec::new();
    let orders_offset = 5 * 32;
    let fills_offset = orders_offset + 32 + 2 * ORDER_WORDS * 32;

    push_word_u128(&mut body, orders_offset as u128);
    push_word_u128(
        &mut body,
        if fills_at_alt_offset { 1 } else { fills_offset as u128 },
    );
    push_word_u128(&mut body, 450_000); // taker fill, stablecoin units
    push_word_u128(&mut body, taker_fill_shares);
    push_word_u128(
        &mut body,
        if fills_at_alt_offset { fills_offset as u128 } else { 0 },
    );

    push_word_u128(&mut body, 2); // orders[].length
    push_order(&mut body, taker_maker, 777, 450_000, 1_000_000, Side::Buy);
    push_order(&mut body, maker_maker, 777, 1_000_000, 450_000, Side::Sell);

    push_word_u128(&mut body, 1); // fillAmounts[].length
    push_word_u128(&mut body, maker_fill);

    let mut calldata = FILL_ORDERS_SELECTOR.to_vec();
    calldata.extend_from_slice(&body);
    calldata
}
