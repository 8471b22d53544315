//! Websocket message types for the market and user feeds.
//!
//! Numeric fields arrive as strings on the wire; timestamps come as
//! millisecond strings and are normalized to seconds at the edge.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::domain::{Pips, Side};

use super::auth::ApiCreds;

/// Subscription request sent to the market websocket.
#[derive(Debug, Serialize)]
pub struct MarketSubscribeMessage {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl MarketSubscribeMessage {
    /// Assets per subscription frame accepted by the server.
    pub const BATCH_LIMIT: usize = 100;

    #[must_use]
    pub fn new(asset_ids: Vec<String>) -> Self {
        Self {
            assets_ids: asset_ids,
            msg_type: "market".into(),
        }
    }
}

/// Subscription/auth frame sent to the user websocket.
#[derive(Debug, Serialize)]
pub struct UserSubscribeMessage {
    pub auth: UserAuthPayload,
    pub markets: Vec<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
}

#[derive(Debug, Serialize)]
pub struct UserAuthPayload {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl UserSubscribeMessage {
    #[must_use]
    pub fn new(creds: &ApiCreds, condition_ids: Vec<String>) -> Self {
        Self {
            auth: UserAuthPayload {
                api_key: creds.api_key.clone(),
                secret: creds.secret.clone(),
                passphrase: creds.passphrase.clone(),
            },
            markets: condition_ids,
            msg_type: "USER".into(),
        }
    }
}

/// Messages received from the market websocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event_type")]
pub enum MarketWsMessage {
    #[serde(rename = "book")]
    Book(BookMessage),

    #[serde(rename = "price_change")]
    PriceChange(PriceChangeMessage),

    #[serde(rename = "last_trade_price")]
    LastTradePrice(LastTradePriceMessage),

    #[serde(rename = "tick_size_change")]
    TickSizeChange(TickSizeChangeMessage),

    #[serde(other)]
    Unknown,
}

/// Full book snapshot for one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct BookMessage {
    pub asset_id: String,
    pub market: Option<String>,
    pub bids: Vec<WsPriceLevel>,
    pub asks: Vec<WsPriceLevel>,
    pub timestamp: Option<String>,
    pub hash: Option<String>,
}

impl BookMessage {
    /// Best bid as `(price, size)`, if any level parses.
    #[must_use]
    pub fn best_bid(&self) -> Option<(Pips, Decimal)> {
        best_level(&self.bids, true)
    }

    /// Best ask as `(price, size)`, if any level parses.
    #[must_use]
    pub fn best_ask(&self) -> Option<(Pips, Decimal)> {
        best_level(&self.asks, false)
    }

    /// Snapshot time normalized to unix seconds.
    #[must_use]
    pub fn timestamp_secs(&self) -> Option<i64> {
        normalize_timestamp(self.timestamp.as_deref()?)
    }
}

fn best_level(levels: &[WsPriceLevel], highest: bool) -> Option<(Pips, Decimal)> {
    let parsed = levels.iter().filter_map(WsPriceLevel::parse);
    if highest {
        parsed.max_by_key(|(price, _)| *price)
    } else {
        parsed.min_by_key(|(price, _)| *price)
    }
}

/// Incremental price update; one entry per touched asset.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeMessage {
    pub market: Option<String>,
    #[serde(default)]
    pub changes: Vec<PriceChangeEntry>,
    pub timestamp: Option<String>,
}

impl PriceChangeMessage {
    /// Update time normalized to unix seconds.
    #[must_use]
    pub fn timestamp_secs(&self) -> Option<i64> {
        normalize_timestamp(self.timestamp.as_deref()?)
    }
}

/// One asset's delta, carrying the new top of book.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceChangeEntry {
    pub asset_id: String,
    pub price: Option<String>,
    pub size: Option<String>,
    pub side: Option<Side>,
    pub best_bid: Option<String>,
    pub best_ask: Option<String>,
}

impl PriceChangeEntry {
    #[must_use]
    pub fn best_bid_pips(&self) -> Option<Pips> {
        parse_price(self.best_bid.as_deref()?)
    }

    #[must_use]
    pub fn best_ask_pips(&self) -> Option<Pips> {
        parse_price(self.best_ask.as_deref()?)
    }
}

/// Last trade print for one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct LastTradePriceMessage {
    pub asset_id: String,
    pub market: Option<String>,
    pub price: Option<String>,
    pub side: Option<Side>,
    pub size: Option<String>,
    pub timestamp: Option<String>,
}

impl LastTradePriceMessage {
    #[must_use]
    pub fn price_pips(&self) -> Option<Pips> {
        parse_price(self.price.as_deref()?)
    }

    #[must_use]
    pub fn timestamp_secs(&self) -> Option<i64> {
        normalize_timestamp(self.timestamp.as_deref()?)
    }
}

/// Tick-size change notification.
#[derive(Debug, Clone, Deserialize)]
pub struct TickSizeChangeMessage {
    pub asset_id: String,
    pub old_tick_size: Option<String>,
    pub new_tick_size: Option<String>,
}

/// Price level as received on the wire (strings, not decimals).
#[derive(Debug, Clone, Deserialize)]
pub struct WsPriceLevel {
    pub price: String,
    pub size: String,
}

impl WsPriceLevel {
    fn parse(&self) -> Option<(Pips, Decimal)> {
        Some((parse_price(&self.price)?, self.size.parse().ok()?))
    }
}

/// Messages received from the user websocket. Everything other than
/// `trade` and `order` is forwarded on the generic channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "event_type")]
pub enum UserWsMessage {
    #[serde(rename = "trade")]
    Trade(UserTradeMessage),

    #[serde(rename = "order")]
    Order(UserOrderMessage),

    #[serde(other)]
    Other,
}

/// A fill on one of the authenticated account's orders.
#[derive(Debug, Clone, Deserialize)]
pub struct UserTradeMessage {
    pub asset_id: String,
    pub market: Option<String>,
    pub side: Option<Side>,
    pub price: Option<String>,
    pub size: Option<String>,
    pub status: Option<String>,
    pub taker_order_id: Option<String>,
    pub timestamp: Option<String>,
}

impl UserTradeMessage {
    #[must_use]
    pub fn price_pips(&self) -> Option<Pips> {
        parse_price(self.price.as_deref()?)
    }

    #[must_use]
    pub fn size_shares(&self) -> Option<Decimal> {
        self.size.as_deref()?.parse().ok()
    }

    #[must_use]
    pub fn timestamp_secs(&self) -> Option<i64> {
        normalize_timestamp(self.timestamp.as_deref()?)
    }
}

/// Order-state transition for one of the account's orders.
#[derive(Debug, Clone, Deserialize)]
pub struct UserOrderMessage {
    pub id: String,
    pub asset_id: String,
    pub market: Option<String>,
    pub side: Option<Side>,
    pub price: Option<String>,
    pub original_size: Option<String>,
    pub size_matched: Option<String>,
    /// PLACEMENT, UPDATE, or CANCELLATION.
    #[serde(rename = "type")]
    pub transition: Option<String>,
    pub timestamp: Option<String>,
}

impl UserOrderMessage {
    #[must_use]
    pub fn size_matched_shares(&self) -> Option<Decimal> {
        self.size_matched.as_deref()?.parse().ok()
    }
}

fn parse_price(raw: &str) -> Option<Pips> {
    Pips::from_decimal(raw.parse().ok()?).ok()
}

/// Millisecond timestamps (13+ digits) are normalized to seconds.
fn normalize_timestamp(raw: &str) -> Option<i64> {
    let value: i64 = raw.parse().ok()?;
    if value >= 1_000_000_000_000 {
        Some(value / 1000)
    } else {
        Some(value)
    }
}
