//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for sensitive values like `WALLET_PRIVATE_KEY`. Validation
//! happens once at startup and is fatal: a process that cannot prove its
//! configuration should not trade.

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::domain::Pips;
use crate::core::strategy::StrategySettings;
use crate::error::{Error, Result};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    pub market: MarketConfig,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub momentum: MomentumConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Addresses whose fills the mempool decoder watches, hex.
    #[serde(default)]
    pub followed_addresses: Vec<String>,
}

/// Exchange endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// REST API base URL.
    pub api_url: String,
    /// Market websocket URL (`/ws/market`).
    pub market_ws_url: String,
    /// User websocket URL (`/ws/user`).
    pub user_ws_url: String,
}

/// Chain node endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// Primary websocket JSON-RPC endpoint.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Backup websocket endpoint.
    #[serde(default)]
    pub backup_ws_url: Option<String>,
    /// HTTP JSON-RPC endpoint for fetches and `eth_call`.
    #[serde(default)]
    pub http_url: Option<String>,
    /// Premium endpoint for `trace_call`.
    #[serde(default)]
    pub trace_url: Option<String>,
}

/// Wallet configuration. The private key itself only ever arrives via
/// the `WALLET_PRIVATE_KEY` environment variable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Funder (proxy wallet) address when signing for a proxy.
    #[serde(default)]
    pub funder: Option<String>,
    /// 0 = EOA, 1 = proxy, 2 = safe.
    #[serde(default)]
    pub signature_type: u8,
}

/// The market family this process trades.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Slug prefix; the cycle start is appended per cycle.
    pub slug_prefix: String,
    pub condition_id: String,
    pub yes_token: String,
    pub no_token: String,
    #[serde(default)]
    pub neg_risk: bool,
    /// Cycle length in seconds (e.g. 900 for quarter-hour markets).
    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: i64,
}

fn default_cycle_secs() -> i64 {
    900
}

/// One enabled strategy instance.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Registry key (`paired_trading`, `pairedtrading`, `long_arb`).
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default)]
    pub settings: StrategySettingsConfig,
}

fn default_true() -> bool {
    true
}

fn default_max_in_flight() -> usize {
    3
}

/// Strategy tunables as they appear in TOML; every field optional so a
/// config names only what it overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategySettingsConfig {
    pub base_target: Option<Decimal>,
    pub build_lot_size: Option<Decimal>,
    pub build_threshold_cents: Option<u32>,
    pub build_end_secs: Option<i64>,
    pub amplify_start_secs: Option<i64>,
    pub early_lock_price_cents: Option<u32>,
    pub early_amplify_price_cents: Option<u32>,
    pub lock_threshold: Option<Decimal>,
    pub insurance_price_cents: Option<u32>,
    pub max_slippage_cents: Option<u32>,
    pub min_order_usdc: Option<Decimal>,
    pub auto_adjust_size: Option<bool>,
    pub max_size_adjust_ratio: Option<Decimal>,
    pub arb_profit_threshold_cents: Option<u32>,
    pub cooldown_ms: Option<i64>,
}

impl StrategySettingsConfig {
    /// Overlay these overrides onto the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a cents value is out of range.
    pub fn resolve(&self) -> Result<StrategySettings> {
        let mut settings = StrategySettings::default();

        let cents = |value: Option<u32>, current: Pips| -> Result<Pips> {
            match value {
                Some(cents) => Pips::from_cents(cents)
                    .map_err(|_| Error::Config(format!("{cents} cents out of range"))),
                None => Ok(current),
            }
        };

        if let Some(v) = self.base_target {
            settings.base_target = v;
        }
        if let Some(v) = self.build_lot_size {
            settings.build_lot_size = v;
        }
        settings.build_threshold = cents(self.build_threshold_cents, settings.build_threshold)?;
        if let Some(v) = self.build_end_secs {
            settings.build_end_secs = v;
        }
        if let Some(v) = self.amplify_start_secs {
            settings.amplify_start_secs = v;
        }
        settings.early_lock_price =
            cents(self.early_lock_price_cents, settings.early_lock_price)?;
        settings.early_amplify_price =
            cents(self.early_amplify_price_cents, settings.early_amplify_price)?;
        if let Some(v) = self.lock_threshold {
            settings.lock_threshold = v;
        }
        settings.insurance_price = cents(self.insurance_price_cents, settings.insurance_price)?;
        settings.max_slippage = cents(self.max_slippage_cents, settings.max_slippage)?;
        if let Some(v) = self.min_order_usdc {
            settings.min_order_usdc = v;
        }
        if let Some(v) = self.auto_adjust_size {
            settings.auto_adjust_size = v;
        }
        if let Some(v) = self.max_size_adjust_ratio {
            settings.max_size_adjust_ratio = v;
        }
        if let Some(cents) = self.arb_profit_threshold_cents {
            settings.arb_profit_threshold_pips = cents * Pips::PER_CENT;
        }
        if let Some(v) = self.cooldown_ms {
            settings.cooldown_ms = v;
        }

        Ok(settings)
    }
}

/// Momentum feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MomentumConfig {
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_momentum_threshold")]
    pub threshold_bps: i64,
    #[serde(default = "default_momentum_window")]
    pub window_secs: u64,
}

fn default_momentum_threshold() -> i64 {
    30
}

fn default_momentum_window() -> u64 {
    30
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            ws_url: None,
            symbols: Vec::new(),
            threshold_bps: default_momentum_threshold(),
            window_secs: default_momentum_window(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of the human format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on unreadable files, parse failures, or
    /// validation failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("{}: {e}", path.as_ref().display())))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The signing key, environment-only by design.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the variable is unset.
    pub fn private_key() -> Result<String> {
        std::env::var("WALLET_PRIVATE_KEY")
            .map_err(|_| Error::Config("WALLET_PRIVATE_KEY is not set".into()))
    }

    fn validate(&self) -> Result<()> {
        if self.network.api_url.is_empty() {
            return Err(Error::Config("network.api_url is empty".into()));
        }
        if self.market.cycle_secs <= 0 {
            return Err(Error::Config("market.cycle_secs must be positive".into()));
        }
        if self.market.yes_token == self.market.no_token {
            return Err(Error::Config(
                "market.yes_token and market.no_token must differ".into(),
            ));
        }
        for strategy in &self.strategies {
            if strategy.max_in_flight == 0 {
                return Err(Error::Config(format!(
                    "strategy {} max_in_flight must be positive",
                    strategy.id
                )));
            }
            strategy.settings.resolve()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [network]
        api_url = "https://clob.example.com"
        market_ws_url = "wss://ws.example.com/ws/market"
        user_ws_url = "wss://ws.example.com/ws/user"

        [market]
        slug_prefix = "btc-updown-15m"
        condition_id = "0xcond"
        yes_token = "111"
        no_token = "222"
    "#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.market.cycle_secs, 900);
        assert!(config.strategies.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn strategy_settings_overlay_defaults() {
        let raw = format!(
            "{MINIMAL}\n[[strategies]]\nid = \"paired_trading\"\n\
             [strategies.settings]\nbase_target = 20\nbuild_threshold_cents = 55\n"
        );
        let config: Config = toml::from_str(&raw).unwrap();
        let settings = config.strategies[0].settings.resolve().unwrap();

        assert_eq!(settings.base_target, dec!(20));
        assert_eq!(settings.build_threshold.pips(), 5_500);
        // Untouched fields keep defaults.
        assert_eq!(settings.cooldown_ms, 1_000);
    }

    #[test]
    fn identical_tokens_fail_validation() {
        let raw = MINIMAL.replace("\"222\"", "\"111\"");
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_cents_fail_validation() {
        let raw = format!(
            "{MINIMAL}\n[[strategies]]\nid = \"paired_trading\"\n\
             [strategies.settings]\nbuild_threshold_cents = 150\n"
        );
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_in_flight_fails_validation() {
        let raw = format!("{MINIMAL}\n[[strategies]]\nid = \"x\"\nmax_in_flight = 0\n");
        let config: Config = toml::from_str(&raw).unwrap();
        assert!(config.validate().is_err());
    }
}
