//! CLOB exchange clients: order construction, signing, submission, and
//! the market/user websocket feeds.

pub mod auth;
pub mod builder;
pub mod market_ws;
pub mod messages;
pub mod rest;
pub mod signing;
pub mod submit;
pub mod user_ws;

pub use auth::ApiCreds;
pub use builder::OrderBuilder;
pub use market_ws::MarketWsClient;
pub use rest::RestClient;
pub use signing::OrderSigner;
pub use submit::Submitter;
pub use user_ws::UserWsClient;
