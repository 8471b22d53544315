//! Per-strategy event loop.
//!
//! One single-threaded loop per strategy merges four inputs: coalesced
//! price signals, order updates, command results, and a periodic tick.
//! Strategy state is only ever touched from inside the loop, so it needs
//! no locks; external producers write into the latest-prices map under
//! its own small lock and nudge the capacity-one signal channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::domain::{MarketSlug, OrderArgs, Outcome, Pips, Side};
use crate::core::service::{OrderUpdate, TradingPort};
use crate::error::Error;

use super::{Intent, PairSnapshot, Quote, Strategy};

/// Capacity of the order-update channel feeding the loop.
pub const ORDER_UPDATE_CAPACITY: usize = 512;

/// Default periodic tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Producer half of the coalescing price signal.
///
/// Writers update the latest-quote map and nudge a capacity-one channel;
/// when the loop is busy the nudge is dropped and the next snapshot
/// simply carries fresher prices. The strategy never sees a queue of
/// stale snapshots.
#[derive(Clone)]
pub struct PriceSignal {
    latest: Arc<Mutex<HashMap<Outcome, Quote>>>,
    signal: mpsc::Sender<()>,
}

impl PriceSignal {
    pub fn publish(&self, outcome: Outcome, quote: Quote) {
        self.latest.lock().insert(outcome, quote);
        let _ = self.signal.try_send(());
    }
}

/// Result of one async order submission.
struct CommandResult {
    intent: &'static str,
    outcome: Result<crate::core::domain::OrderId, Error>,
    /// Dropping this releases the in-flight slot.
    _permit: OwnedSemaphorePermit,
}

/// The event loop driving one strategy.
pub struct StrategyRuntime {
    strategy: Box<dyn Strategy>,
    service: Arc<dyn TradingPort>,
    latest: Arc<Mutex<HashMap<Outcome, Quote>>>,
    price_rx: mpsc::Receiver<()>,
    order_rx: mpsc::Receiver<OrderUpdate>,
    cmd_tx: mpsc::Sender<CommandResult>,
    cmd_rx: mpsc::Receiver<CommandResult>,
    in_flight: Arc<Semaphore>,
    tick: Duration,
    lot_size: Decimal,
}

impl StrategyRuntime {
    /// Build a runtime and the price-signal producer for its feeds.
    #[must_use]
    pub fn new(
        strategy: Box<dyn Strategy>,
        service: Arc<dyn TradingPort>,
        order_rx: mpsc::Receiver<OrderUpdate>,
        max_in_flight: usize,
        lot_size: Decimal,
    ) -> (Self, PriceSignal) {
        let latest = Arc::new(Mutex::new(HashMap::new()));
        let (signal_tx, price_rx) = mpsc::channel(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let producer = PriceSignal {
            latest: Arc::clone(&latest),
            signal: signal_tx,
        };

        (
            Self {
                strategy,
                service,
                latest,
                price_rx,
                order_rx,
                cmd_tx,
                cmd_rx,
                in_flight: Arc::new(Semaphore::new(max_in_flight)),
                tick: DEFAULT_TICK,
                lot_size,
            },
            producer,
        )
    }

    /// Override the periodic tick interval.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run the loop until cancellation.
    pub async fn run(mut self, cancel: CancellationToken) {
        let id = self.strategy.id();
        let market = self.strategy.market().slug().clone();
        info!(strategy = id, market = %market, "Strategy loop started");

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,

                signal = self.price_rx.recv() => {
                    if signal.is_none() {
                        break; // producers gone
                    }
                    let snapshot = self.take_snapshot();
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let intents = self.strategy.on_prices(&snapshot, now_ms);
                    self.dispatch(intents, &market).await;
                }

                update = self.order_rx.recv() => {
                    let Some(update) = update else {
                        break; // fan-out gone
                    };
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let intents = self.strategy.on_order_update(&update, now_ms);
                    self.dispatch(intents, &market).await;
                }

                result = self.cmd_rx.recv() => {
                    // The loop holds its own sender, so recv never yields None.
                    let Some(result) = result else { break };
                    match result.outcome {
                        Ok(order_id) => {
                            debug!(strategy = id, intent = result.intent, order_id = %order_id, "Order placed");
                        }
                        Err(Error::Reject(ref reject)) if reject.is_expected() => {
                            warn!(strategy = id, intent = result.intent, reason = %reject, "Order skipped");
                        }
                        Err(e) => {
                            warn!(strategy = id, intent = result.intent, error = %e, "Order failed");
                        }
                    }
                    // The permit inside `result` drops here, freeing a slot.
                }

                _ = ticker.tick() => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let intents = self.strategy.on_tick(now_ms);
                    self.dispatch(intents, &market).await;
                }
            }
        }

        info!(strategy = id, market = %market, "Strategy loop stopped");
    }

    /// Snapshot both sides and clear the map so the next signal carries
    /// only fresh prices.
    fn take_snapshot(&self) -> PairSnapshot {
        let mut latest = self.latest.lock();
        let snapshot = PairSnapshot {
            yes: latest.get(&Outcome::Yes).copied(),
            no: latest.get(&Outcome::No).copied(),
        };
        latest.clear();
        snapshot
    }

    /// Turn intents into chunked submissions under the in-flight limit.
    ///
    /// Chunks that do not get a slot are dropped; the strategy re-derives
    /// its demand on the next tick from current state, so deferred chunks
    /// are re-requested rather than queued. A pair buy goes through the
    /// service's multi-leg path with one slot per leg, all-or-nothing.
    async fn dispatch(&mut self, intents: Vec<Intent>, market: &MarketSlug) {
        for intent in intents {
            let kind = intent.kind();

            if let Intent::BuyPair { .. } = intent {
                let legs = self.explode(&intent);
                let mut permits = Vec::with_capacity(legs.len());
                for _ in &legs {
                    match Arc::clone(&self.in_flight).try_acquire_owned() {
                        Ok(permit) => permits.push(permit),
                        Err(_) => {
                            debug!(intent = kind, "In-flight limit reached, deferring pair");
                            return;
                        }
                    }
                }

                let service = Arc::clone(&self.service);
                let cmd_tx = self.cmd_tx.clone();
                let market = market.clone();
                tokio::spawn(async move {
                    let results = service.execute_multi_leg(&market, legs, true).await;
                    for (outcome, permit) in results.into_iter().zip(permits) {
                        let _ = cmd_tx
                            .send(CommandResult {
                                intent: kind,
                                outcome,
                                _permit: permit,
                            })
                            .await;
                    }
                });
                continue;
            }

            for args in self.explode(&intent) {
                let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
                    debug!(intent = kind, "In-flight limit reached, deferring chunks");
                    return;
                };

                let service = Arc::clone(&self.service);
                let cmd_tx = self.cmd_tx.clone();
                let market = market.clone();
                tokio::spawn(async move {
                    let outcome = service.place_order(&market, args).await;
                    let _ = cmd_tx
                        .send(CommandResult {
                            intent: kind,
                            outcome,
                            _permit: permit,
                        })
                        .await;
                });
            }
        }
    }

    /// Split an intent into lot-sized order chunks.
    fn explode(&self, intent: &Intent) -> Vec<OrderArgs> {
        let market = self.strategy.market();
        let neg_risk = market.neg_risk();

        let leg = |outcome: Outcome, size: Decimal, limit: Pips| {
            chunk_sizes(size, self.lot_size)
                .into_iter()
                .map(|chunk| {
                    OrderArgs::new(
                        market.token(outcome).clone(),
                        Side::Buy,
                        chunk,
                        limit,
                    )
                    .with_neg_risk(neg_risk)
                })
                .collect::<Vec<_>>()
        };

        match *intent {
            Intent::Build { outcome, size, limit }
            | Intent::LockRisk { outcome, size, limit }
            | Intent::Insurance { outcome, size, limit }
            | Intent::Amplify { outcome, size, limit } => leg(outcome, size, limit),
            Intent::BuyPair {
                size,
                yes_limit,
                no_limit,
            } => {
                let mut legs = leg(Outcome::Yes, size, yes_limit);
                legs.extend(leg(Outcome::No, size, no_limit));
                legs
            }
        }
    }
}

/// Split a total size into lot-sized chunks, last chunk short.
#[must_use]
pub fn chunk_sizes(total: Decimal, lot: Decimal) -> Vec<Decimal> {
    if total <= Decimal::ZERO {
        return Vec::new();
    }
    if lot <= Decimal::ZERO || total <= lot {
        return vec![total];
    }

    let mut chunks = Vec::new();
    let mut remaining = total;
    while remaining > lot {
        chunks.push(lot);
        remaining -= lot;
    }
    if remaining > Decimal::ZERO {
        chunks.push(remaining);
    }
    chunks
}

/// True when an error is routine cycle-rollover noise.
#[must_use]
pub fn is_rollover_noise(error: &Error) -> bool {
    matches!(error, Error::Reject(reject) if reject.is_expected())
}
