//! Cross-cutting services: the trading facade, market-quality gate, and
//! the external momentum feed.

pub mod momentum;
pub mod quality;
pub mod trading;

pub use momentum::{MomentumFeed, MomentumSignal};
pub use quality::{assess_quality, MarketQuality, QualityReason};
pub use trading::{OrderStatus, OrderUpdate, TradingPort, TradingService};
