//! Application layer - configuration, logging, and wiring.

mod config;
mod logging;
mod runner;

pub use config::{
    ChainConfig, Config, LoggingConfig, MarketConfig, MomentumConfig, NetworkConfig,
    StrategyConfig, WalletConfig,
};
pub use runner::run;
