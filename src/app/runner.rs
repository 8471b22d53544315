//! Process wiring.
//!
//! Builds the clients, the trading service, and one strategy runtime per
//! enabled strategy, then supervises market cycles: each cycle gets a
//! fresh [`Market`], fresh strategy instances, and a cycle-scoped
//! cancellation token; rollover cancels the old loops and cancels any
//! orders still resting on the previous cycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::chain::{logs::LogWatcher, FollowedAddresses, MempoolWatcher, RpcClient};
use crate::core::domain::{Market, MarketSlug, Outcome, Pips, SignatureType, TokenId};
use crate::core::exchange::messages::MarketWsMessage;
use crate::core::exchange::{
    MarketWsClient, OrderBuilder, OrderSigner, RestClient, Submitter, UserWsClient,
};
use crate::core::service::{MomentumFeed, TradingPort, TradingService};
use crate::core::strategy::runtime::{PriceSignal, StrategyRuntime};
use crate::core::strategy::{Quote, StrategyRegistry};
use crate::error::{Error, Result};

use super::config::Config;
use super::logging;

/// Market websocket reconnect budget before the feed goes terminal.
const MARKET_WS_MAX_ATTEMPTS: u32 = 30;

/// User websocket reconnect budget before the feed goes terminal.
const USER_WS_MAX_ATTEMPTS: u32 = 30;

/// Price producers for the current cycle's strategies.
type SignalFanout = Arc<RwLock<Vec<PriceSignal>>>;

/// Run the agent until ctrl-c.
///
/// # Errors
///
/// Returns startup validation and connection errors; runtime stream
/// failures are retried internally and do not bubble out.
pub async fn run(config: Config) -> Result<()> {
    logging::init(&config.logging);
    info!("updown starting");

    let signature_type = match config.wallet.signature_type {
        0 => SignatureType::Eoa,
        1 => SignatureType::Proxy,
        2 => SignatureType::Safe,
        other => return Err(Error::Config(format!("unknown signature_type {other}"))),
    };
    let funder = config
        .wallet
        .funder
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|e| Error::Config(format!("wallet.funder: {e}")))?;
    let signer = OrderSigner::from_private_key(&Config::private_key()?, funder, signature_type)?;
    let address = format!("{:?}", signer.address());
    info!(address = %address, "Wallet loaded");

    // REST client: warm the pool, then derive credentials.
    let rest = Arc::new(RestClient::new(config.network.api_url.clone(), address.clone())?);
    rest.warm().await?;
    let creds = match rest.derive_api_key(&signer, 0).await {
        Ok(creds) => creds,
        Err(e) => {
            warn!(error = %e, "Credential derivation failed, creating fresh key");
            rest.create_api_key(&signer, 0).await?
        }
    };

    let submitter = Submitter::new(Arc::clone(&rest), OrderBuilder::new(signer));
    let service = TradingService::new(submitter, rust_decimal::Decimal::ONE);

    let cancel = CancellationToken::new();
    let fanout: SignalFanout = Arc::new(RwLock::new(Vec::new()));

    spawn_market_feed(&config, &service, &fanout, &cancel);
    spawn_user_feed(&config, &service, &address, creds, &cancel);
    spawn_chain_watchers(&config, &cancel)?;
    spawn_momentum(&config, &cancel);

    // Cycle supervisor runs in the foreground until shutdown.
    tokio::select! {
        () = supervise_cycles(&config, Arc::clone(&service), Arc::clone(&fanout), cancel.clone()) => {}
        result = tokio::signal::ctrl_c() => {
            result.map_err(Error::from)?;
            info!("Shutdown signal received");
        }
    }

    cancel.cancel();
    // Give websocket clients their close-frame drain budget.
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!("updown stopped");
    Ok(())
}

/// Market feed: book and price-change events update the shared cache and
/// nudge every current strategy's price signal.
fn spawn_market_feed(
    config: &Config,
    service: &Arc<TradingService>,
    fanout: &SignalFanout,
    cancel: &CancellationToken,
) {
    let (events_tx, mut events_rx) = mpsc::channel::<MarketWsMessage>(1024);
    let (errors_tx, mut errors_rx) = mpsc::channel(8);

    let client = MarketWsClient::new(
        config.network.market_ws_url.clone(),
        events_tx,
        errors_tx,
        MARKET_WS_MAX_ATTEMPTS,
    );
    client.set_subscriptions(vec![
        config.market.yes_token.clone(),
        config.market.no_token.clone(),
    ]);
    tokio::spawn(client.run(cancel.clone()));

    // Terminal feed errors pause trading rather than kill the process.
    let pause_service = Arc::clone(service);
    tokio::spawn(async move {
        if let Some(e) = errors_rx.recv().await {
            warn!(error = %e, "Market feed terminal error, pausing trading");
            pause_service.set_trading_paused(true);
        }
    });

    let service = Arc::clone(service);
    let fanout = Arc::clone(fanout);
    let yes_token = TokenId::from(config.market.yes_token.clone());
    let cancel = cancel.clone();

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => return,
                msg = events_rx.recv() => msg,
            };
            let Some(message) = message else { return };

            match message {
                MarketWsMessage::Book(book) => {
                    let token = TokenId::from(book.asset_id.clone());
                    let (bid, bid_size) = book.best_bid().unwrap_or_default();
                    let (ask, ask_size) = book.best_ask().unwrap_or_default();
                    let taken_at = book
                        .timestamp_secs()
                        .unwrap_or_else(|| chrono::Utc::now().timestamp());

                    service.update_book(token.clone(), bid, ask, bid_size, ask_size, taken_at);
                    publish(&fanout, &yes_token, &token, Quote { bid, ask });
                }
                MarketWsMessage::PriceChange(change) => {
                    let taken_at = change
                        .timestamp_secs()
                        .unwrap_or_else(|| chrono::Utc::now().timestamp());
                    for entry in &change.changes {
                        let (Some(bid), Some(ask)) =
                            (entry.best_bid_pips(), entry.best_ask_pips())
                        else {
                            continue;
                        };
                        let token = TokenId::from(entry.asset_id.clone());
                        service.update_book_prices(token.clone(), bid, ask, taken_at);
                        publish(&fanout, &yes_token, &token, Quote { bid, ask });
                    }
                }
                MarketWsMessage::LastTradePrice(trade) => {
                    debug!(asset = %trade.asset_id, price = ?trade.price_pips(), "Last trade");
                }
                MarketWsMessage::TickSizeChange(change) => {
                    info!(asset = %change.asset_id, new = ?change.new_tick_size, "Tick size changed");
                }
                MarketWsMessage::Unknown => {}
            }
        }
    });
}

fn publish(fanout: &SignalFanout, yes_token: &TokenId, token: &TokenId, quote: Quote) {
    let outcome = if token == yes_token {
        Outcome::Yes
    } else {
        Outcome::No
    };
    for signal in fanout.read().iter() {
        signal.publish(outcome, quote);
    }
}

/// User feed: order and fill updates flow into the trading service.
fn spawn_user_feed(
    config: &Config,
    service: &Arc<TradingService>,
    address: &str,
    creds: crate::core::exchange::ApiCreds,
    cancel: &CancellationToken,
) {
    let (events_tx, mut events_rx) = mpsc::channel(1024);
    let (other_tx, mut other_rx) = mpsc::channel(64);
    let (errors_tx, mut errors_rx) = mpsc::channel(8);

    let client = UserWsClient::new(
        config.network.user_ws_url.clone(),
        address,
        creds,
        events_tx,
        other_tx,
        errors_tx,
        USER_WS_MAX_ATTEMPTS,
    );
    client.set_markets(vec![config.market.condition_id.clone()]);
    tokio::spawn(client.run(cancel.clone()));

    // No user feed means no fill accounting; pause trading.
    let pause_service = Arc::clone(service);
    tokio::spawn(async move {
        if let Some(e) = errors_rx.recv().await {
            warn!(error = %e, "User feed terminal error, pausing trading");
            pause_service.set_trading_paused(true);
        }
    });

    let service = Arc::clone(service);
    let cancel_consume = cancel.clone();
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                () = cancel_consume.cancelled() => return,
                message = events_rx.recv() => message,
            };
            let Some(message) = message else { return };
            service.handle_user_message(&message);
        }
    });

    tokio::spawn(async move {
        while let Some(raw) = other_rx.recv().await {
            debug!(raw = %raw, "Unhandled user-feed message");
        }
    });
}

/// Chain watchers: pending-tx decoding and confirmed OrderFilled logs.
fn spawn_chain_watchers(config: &Config, cancel: &CancellationToken) -> Result<()> {
    let Some(ws_url) = config.chain.ws_url.clone() else {
        info!("No chain endpoint configured, trade detection disabled");
        return Ok(());
    };
    let http_url = config
        .chain
        .http_url
        .clone()
        .ok_or_else(|| Error::Config("chain.ws_url set without chain.http_url".into()))?;

    let followed = FollowedAddresses::new(config.followed_addresses.iter());
    if followed.is_empty() {
        info!("No followed addresses configured");
    }

    let rpc = RpcClient::new(http_url, None, config.chain.trace_url.clone())?;
    let (trades_tx, mut trades_rx) = mpsc::channel(1024);

    let mempool = MempoolWatcher::new(
        ws_url.clone(),
        config.chain.backup_ws_url.clone(),
        rpc,
        followed.clone(),
        trades_tx.clone(),
    );
    tokio::spawn(mempool.run(cancel.clone()));

    let logs = LogWatcher::new(ws_url, followed, trades_tx);
    tokio::spawn(logs.run(cancel.clone()));

    let cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => return,
                event = trades_rx.recv() => event,
            };
            let Some(event) = event else { return };
            info!(
                tx_hash = %event.tx_hash,
                confirmed = event.log_index.is_some(),
                party = %event.party,
                role = %event.role,
                side = %event.side,
                size = %event.fill_shares(),
                price = ?event.price(),
                "Watched trade"
            );
        }
    });

    Ok(())
}

/// External momentum feed; idle when unconfigured.
fn spawn_momentum(config: &Config, cancel: &CancellationToken) {
    let Some(ws_url) = config.momentum.ws_url.clone() else {
        warn!("Momentum feed unconfigured, idling");
        return;
    };

    let (feed, mut signals) = MomentumFeed::new(
        ws_url,
        config.momentum.symbols.clone(),
        Duration::from_secs(config.momentum.window_secs),
        config.momentum.threshold_bps,
    );
    tokio::spawn(feed.run(cancel.clone()));

    let cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                () = cancel.cancelled() => return,
                signal = signals.recv() => signal,
            };
            let Some(signal) = signal else { return };
            info!(
                asset = %signal.asset,
                dir = signal.dir,
                move_bps = signal.move_bps,
                "Momentum signal"
            );
        }
    });
}

/// Supervise market cycles: one fresh market and strategy set per cycle.
async fn supervise_cycles(
    config: &Config,
    service: Arc<TradingService>,
    fanout: SignalFanout,
    cancel: CancellationToken,
) {
    let registry = StrategyRegistry::builtin();

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let now = chrono::Utc::now().timestamp();
        let period_start = now - now.rem_euclid(config.market.cycle_secs);
        let market = cycle_market(config, period_start);
        let slug = market.slug().clone();

        service.set_current_market(slug.clone());
        info!(market = %slug, period_start, "Cycle started");

        let cycle_cancel = cancel.child_token();
        let mut producers = Vec::new();

        for strategy_config in config.strategies.iter().filter(|s| s.enabled) {
            let settings = match strategy_config.settings.resolve() {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(strategy = %strategy_config.id, error = %e, "Bad settings, skipping");
                    continue;
                }
            };
            let strategy = match registry.build(&strategy_config.id, &settings, market.clone()) {
                Ok(strategy) => strategy,
                Err(e) => {
                    warn!(strategy = %strategy_config.id, error = %e, "Unknown strategy, skipping");
                    continue;
                }
            };

            let order_rx = service.register_order_update_handler();
            let (runtime, signal) = StrategyRuntime::new(
                strategy,
                Arc::clone(&service) as Arc<dyn TradingPort>,
                order_rx,
                strategy_config.max_in_flight,
                settings.build_lot_size,
            );
            producers.push(signal);
            tokio::spawn(runtime.run(cycle_cancel.clone()));
        }

        *fanout.write() = producers;

        // Sleep out the cycle, then roll over.
        let remaining = market.remaining(chrono::Utc::now().timestamp()).max(1);
        tokio::select! {
            () = cancel.cancelled() => {
                cycle_cancel.cancel();
                return;
            }
            () = tokio::time::sleep(Duration::from_secs(remaining as u64)) => {}
        }

        cycle_cancel.cancel();
        if let Err(e) = service.cancel_orders_for_market(&slug).await {
            warn!(market = %slug, error = %e, "Rollover cancel failed");
        }
    }
}

fn cycle_market(config: &Config, period_start: i64) -> Market {
    Market::new(
        MarketSlug::from(format!("{}-{period_start}", config.market.slug_prefix)),
        config.market.condition_id.clone(),
        TokenId::from(config.market.yes_token.clone()),
        TokenId::from(config.market.no_token.clone()),
        config.market.neg_risk,
        period_start,
        config.market.cycle_secs,
        Pips::new(100).unwrap_or(Pips::ZERO),
        rust_decimal::Decimal::ONE,
        rust_decimal::Decimal::new(1, 1),
    )
}
