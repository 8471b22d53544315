//! Core domain types for updown.
//!
//! ## Price Types
//!
//! - [`Pips`] - Fixed-point price in ten-thousandths of a unit
//! - [`PriceTick`] / [`TickWindow`] - Rolling spot-price tape per asset
//!
//! ## Market Types
//!
//! - [`Market`] - A binary market with one cycle's YES/NO token pair
//! - [`Outcome`] - Which side of the pair a token represents
//!
//! ## Book Types
//!
//! - [`TopOfBook`] - Best bid/ask for both outcome tokens
//! - [`EffectivePrices`] - Mirrored effective buy/sell prices
//! - [`ArbitrageOpportunity`] - Long arbitrage detected from a book
//!
//! ## Order Types
//!
//! - [`Side`], [`OrderType`], [`SignatureType`] - Wire-level order enums
//! - [`OrderArgs`] - Pre-quantization order request
//! - [`SignedOrder`] - Fully signed order ready for submission
//!
//! ## Position Types
//!
//! - [`PairedPosition`] - Running share/cost sums for both legs
//!
//! ## Trade Types
//!
//! - [`TradeEvent`] - Decoded pending or confirmed fill for a watched party

mod book;
mod id;
mod market;
mod order;
mod position;
mod price;
mod tick;
mod trade;

pub use book::{check_arbitrage, ArbitrageOpportunity, EffectivePrices, TopOfBook};
pub use id::{MarketSlug, OrderId, TokenId};
pub use market::{Market, Outcome};
pub use order::{OrderArgs, OrderType, Side, SignatureType, SignedOrder};
pub use position::PairedPosition;
pub use price::Pips;
pub use tick::{PriceTick, TickWindow};
pub use trade::{ContractKind, Role, TradeEvent};
