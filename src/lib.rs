//! Updown - automated trading agent for binary prediction-market CLOBs.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # Reusable library components
//! │   ├── domain/       # Pure domain types (prices, books, positions)
//! │   ├── exchange/     # CLOB REST/WS clients, order building and signing
//! │   ├── chain/        # Mempool + log decoders over an EVM node
//! │   ├── service/      # Trading facade, market quality, momentum feed
//! │   └── strategy/     # Strategy trait, event-loop runtime, engines
//! └── app/              # Configuration, logging, wiring
//! ```
//!
//! Data flows from the websocket clients into the trading service, which
//! fans price and order updates out to per-strategy event loops; intents
//! flow back through the service as signed orders over REST.

pub mod app;
pub mod core;
pub mod error;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
