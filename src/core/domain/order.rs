//! Wire-level order types.
//!
//! Amounts are six-decimal base units of the stablecoin / outcome token.
//! For BUY the maker leg is stablecoin and the taker leg is shares; for
//! SELL the legs are reversed.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::TokenId;
use super::price::Pips;

/// Order side. The wire encoding is `0` for BUY and `1` for SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
        }
    }

    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Buy),
            1 => Some(Self::Sell),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-in-force submitted alongside the signed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill-or-kill: all-or-nothing immediate.
    FOK,
    /// Fill-and-kill: fill what crosses immediately, cancel the rest.
    FAK,
    /// Good-till-cancel.
    GTC,
    /// Good-till-date.
    GTD,
}

impl OrderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FOK => "FOK",
            Self::FAK => "FAK",
            Self::GTC => "GTC",
            Self::GTD => "GTD",
        }
    }
}

/// How the exchange verifies the order signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    /// Plain EOA ECDSA signature.
    Eoa,
    /// Polymarket proxy-wallet signature.
    Proxy,
    /// Gnosis Safe signature.
    Safe,
}

impl SignatureType {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Eoa => 0,
            Self::Proxy => 1,
            Self::Safe => 2,
        }
    }
}

/// A pre-quantization order request as strategies express it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderArgs {
    pub token_id: TokenId,
    pub side: Side,
    /// Size in native shares.
    pub size: Decimal,
    pub price: Pips,
    /// Signatures verify against the neg-risk exchange when set.
    pub neg_risk: bool,
}

impl OrderArgs {
    pub fn new(token_id: impl Into<TokenId>, side: Side, size: Decimal, price: Pips) -> Self {
        Self {
            token_id: token_id.into(),
            side,
            size,
            price,
            neg_risk: false,
        }
    }

    #[must_use]
    pub fn with_neg_risk(mut self, neg_risk: bool) -> Self {
        self.neg_risk = neg_risk;
        self
    }
}

/// A fully signed order, serialized exactly as `POST /order` expects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOrder {
    pub salt: u64,
    pub maker: String,
    pub signer: String,
    pub taker: String,
    pub token_id: String,
    /// Six-decimal base units, decimal string.
    pub maker_amount: String,
    pub taker_amount: String,
    pub expiration: String,
    pub nonce: String,
    pub fee_rate_bps: String,
    pub side: Side,
    pub signature_type: u8,
    /// 65 bytes `r || s || v` hex, `v` in `{27, 28}`.
    pub signature: String,
}

impl SignedOrder {
    /// Maker-leg amount in base units.
    #[must_use]
    pub fn maker_units(&self) -> u64 {
        self.maker_amount.parse().unwrap_or(0)
    }

    /// Taker-leg amount in base units.
    #[must_use]
    pub fn taker_units(&self) -> u64 {
        self.taker_amount.parse().unwrap_or(0)
    }

    /// Share-leg amount in base units (side-dependent).
    #[must_use]
    pub fn share_units(&self) -> u64 {
        match self.side {
            Side::Buy => self.taker_units(),
            Side::Sell => self.maker_units(),
        }
    }

    /// Stablecoin-leg amount in base units (side-dependent).
    #[must_use]
    pub fn usdc_units(&self) -> u64 {
        match self.side {
            Side::Buy => self.maker_units(),
            Side::Sell => self.taker_units(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_wire_encoding() {
        assert_eq!(Side::Buy.as_u8(), 0);
        assert_eq!(Side::Sell.as_u8(), 1);
        assert_eq!(Side::from_u8(1), Some(Side::Sell));
        assert_eq!(Side::from_u8(2), None);
    }

    #[test]
    fn side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
    }

    #[test]
    fn signed_order_leg_selection() {
        let order = SignedOrder {
            salt: 1,
            maker: String::new(),
            signer: String::new(),
            taker: String::new(),
            token_id: "1".into(),
            maker_amount: "500000".into(),
            taker_amount: "1000000".into(),
            expiration: "0".into(),
            nonce: "0".into(),
            fee_rate_bps: "0".into(),
            side: Side::Buy,
            signature_type: 0,
            signature: String::new(),
        };

        assert_eq!(order.usdc_units(), 500_000);
        assert_eq!(order.share_units(), 1_000_000);
    }
}
