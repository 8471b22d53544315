//! Crate-wide error taxonomy.
//!
//! Transport failures are retried close to the network and never reach
//! strategy code; decode failures drop the offending event; exchange
//! rejections surface to the strategy that caused them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("price {0} outside [0, 10000] pips")]
    InvalidPips(i64),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Reject(#[from] ExchangeReject),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Strategy error: {0}")]
    Strategy(String),

    #[error("operation canceled")]
    Canceled,
}

/// Failures while producing a signed order. All fatal to the call.
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("bad signing key: {0}")]
    BadKey(String),

    #[error("typed-data hash failed: {0}")]
    HashError(String),

    #[error("ECDSA signing failed: {0}")]
    SignError(String),
}

/// Order rejections returned by the exchange or raised by the facade.
///
/// `TradingPaused` and `MarketMismatch` are expected around cycle rollover
/// and are logged at warn rather than propagated as strategy failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeReject {
    #[error("trading is paused")]
    TradingPaused,

    #[error("order addressed to stale market {submitted}, current is {current}")]
    MarketMismatch { submitted: String, current: String },

    #[error("order below exchange minimum: {0}")]
    OrderTooSmall(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("no order book for asset {0}")]
    NoBook(String),

    #[error("best ask {ask_pips} pips above cap {cap_pips} pips")]
    PriceAboveCap { ask_pips: u32, cap_pips: u32 },

    #[error("exchange rejected order: {0}")]
    Remote(String),
}

impl ExchangeReject {
    /// True for rejections that are routine under cycle rollover.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::TradingPaused | Self::MarketMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
