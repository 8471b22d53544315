//! Trading service facade.
//!
//! The single write path to the exchange. Owns the in-flight order set,
//! the process-wide trading-paused latch, the current-market slug guard,
//! the per-token book cache, and the order-update fan-out. Strategies
//! talk to it only through the narrow [`TradingPort`] capability trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::domain::{
    Market, MarketSlug, OrderArgs, OrderId, Outcome, Pips, Side, TokenId, TopOfBook,
};
use crate::core::exchange::messages::{UserOrderMessage, UserTradeMessage, UserWsMessage};
use crate::core::exchange::Submitter;
use crate::error::{Error, ExchangeReject, Result};

use super::quality::{assess_quality, MarketQuality};

/// Capacity of each registered order-update channel.
const ORDER_UPDATE_CAPACITY: usize = 512;

/// Book snapshots older than this are reported as stale.
const BOOK_MAX_AGE_SECS: i64 = 30;

/// Order lifecycle as seen by strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Placed,
    PartiallyFilled,
    Filled,
    Canceled,
}

/// One order-update delivery. Every registered handler receives its own
/// copy; a slow consumer backpressures nobody else.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub token_id: TokenId,
    pub market: Option<String>,
    pub side: Option<Side>,
    pub price: Option<Pips>,
    pub size_matched: Decimal,
    pub status: OrderStatus,
}

/// Where a top-of-book answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSource {
    Websocket,
    Rest,
}

/// Narrow capability surface strategies depend on.
#[async_trait]
pub trait TradingPort: Send + Sync {
    /// Best ask for a token, rejected when above the cap.
    async fn quote_buy_price(&self, token_id: &TokenId, max_price: Pips) -> Result<Pips>;

    /// Submit one order addressed to a market cycle.
    async fn place_order(&self, market: &MarketSlug, args: OrderArgs) -> Result<OrderId>;

    /// Submit several legs; `parallel` races them, otherwise sequential.
    async fn execute_multi_leg(
        &self,
        market: &MarketSlug,
        legs: Vec<OrderArgs>,
        parallel: bool,
    ) -> Vec<Result<OrderId>>;

    /// Cancel every tracked order for a market. Returns the count.
    async fn cancel_orders_for_market(&self, market: &MarketSlug) -> Result<usize>;

    /// Composed top-of-book for a market's token pair.
    fn top_of_book(&self, market: &Market) -> Result<(TopOfBook, BookSource)>;

    /// Liquidity/freshness score for a market.
    fn market_quality(&self, market: &Market) -> Result<MarketQuality>;

    /// Net open share positions per token.
    fn open_positions(&self) -> HashMap<TokenId, Decimal>;

    /// Register an order-update handler; updates arrive in registration
    /// order, each handler on its own channel.
    fn register_order_update_handler(&self) -> mpsc::Receiver<OrderUpdate>;
}

/// One token's cached top of book.
#[derive(Debug, Clone, Copy, Default)]
struct CachedTop {
    bid: Pips,
    ask: Pips,
    bid_size: Decimal,
    ask_size: Decimal,
    taken_at: i64,
}

/// The concrete trading service.
pub struct TradingService {
    submitter: Submitter,
    books: RwLock<HashMap<TokenId, CachedTop>>,
    /// Process-wide latch; every placement fails fast when set.
    trading_paused: AtomicBool,
    /// Slug guard: intents addressed to any other cycle are rejected.
    current_market: RwLock<Option<MarketSlug>>,
    /// Orders submitted and not yet terminal, per market.
    in_flight: Mutex<HashMap<MarketSlug, Vec<OrderId>>>,
    handlers: Mutex<Vec<mpsc::Sender<OrderUpdate>>>,
    positions: RwLock<HashMap<TokenId, Decimal>>,
    min_quality_size: Decimal,
}

impl TradingService {
    #[must_use]
    pub fn new(submitter: Submitter, min_quality_size: Decimal) -> Arc<Self> {
        Arc::new(Self {
            submitter,
            books: RwLock::new(HashMap::new()),
            trading_paused: AtomicBool::new(false),
            current_market: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
            handlers: Mutex::new(Vec::new()),
            positions: RwLock::new(HashMap::new()),
            min_quality_size,
        })
    }

    /// Set or clear the process-wide pause latch.
    pub fn set_trading_paused(&self, paused: bool) {
        self.trading_paused.store(paused, Ordering::SeqCst);
        if paused {
            warn!("Trading paused");
        } else {
            info!("Trading resumed");
        }
    }

    #[must_use]
    pub fn is_trading_paused(&self) -> bool {
        self.trading_paused.load(Ordering::SeqCst)
    }

    /// Roll over to a new market cycle.
    ///
    /// Clears the in-flight accounting of the previous cycle so its
    /// limits do not leak into the new one; stale intents addressed to
    /// the old slug fail with `MarketMismatch` from then on.
    pub fn set_current_market(&self, slug: MarketSlug) {
        let previous = self.current_market.write().replace(slug.clone());
        if let Some(previous) = previous {
            if previous != slug {
                let drained = self.in_flight.lock().remove(&previous).unwrap_or_default();
                info!(
                    market = %slug,
                    previous = %previous,
                    dropped_in_flight = drained.len(),
                    "Market cycle rolled over"
                );
            }
        }
    }

    /// Update the cached top of book for one token.
    pub fn update_book(
        &self,
        token_id: TokenId,
        bid: Pips,
        ask: Pips,
        bid_size: Decimal,
        ask_size: Decimal,
        taken_at: i64,
    ) {
        self.books.write().insert(
            token_id,
            CachedTop {
                bid,
                ask,
                bid_size,
                ask_size,
                taken_at,
            },
        );
    }

    /// Update only the cached prices for one token, keeping the last
    /// known sizes (price-change deltas do not carry depth).
    pub fn update_book_prices(&self, token_id: TokenId, bid: Pips, ask: Pips, taken_at: i64) {
        let mut books = self.books.write();
        let entry = books.entry(token_id).or_default();
        entry.bid = bid;
        entry.ask = ask;
        entry.taken_at = taken_at;
    }

    /// Feed one user-websocket message through position accounting and
    /// the order-update fan-out.
    pub fn handle_user_message(&self, message: &UserWsMessage) {
        match message {
            UserWsMessage::Trade(trade) => self.apply_trade(trade),
            UserWsMessage::Order(order) => self.apply_order(order),
            UserWsMessage::Other => {}
        }
    }

    fn apply_trade(&self, trade: &UserTradeMessage) {
        let Some(size) = trade.size_shares() else {
            return;
        };
        let token = TokenId::from(trade.asset_id.clone());
        let delta = match trade.side {
            Some(Side::Sell) => -size,
            _ => size,
        };
        *self.positions.write().entry(token).or_default() += delta;
    }

    fn apply_order(&self, order: &UserOrderMessage) {
        let status = match order.transition.as_deref() {
            Some("PLACEMENT") => OrderStatus::Placed,
            Some("CANCELLATION") => OrderStatus::Canceled,
            _ => {
                if order.size_matched_shares().unwrap_or_default()
                    >= order
                        .original_size
                        .as_deref()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(Decimal::MAX)
                {
                    OrderStatus::Filled
                } else {
                    OrderStatus::PartiallyFilled
                }
            }
        };

        let order_id = OrderId::new(order.id.clone());
        if matches!(status, OrderStatus::Filled | OrderStatus::Canceled) {
            self.release_in_flight(&order_id);
        }

        let update = OrderUpdate {
            order_id,
            token_id: TokenId::from(order.asset_id.clone()),
            market: order.market.clone(),
            side: order.side,
            price: order.price.as_deref().and_then(|p| {
                Pips::from_decimal(p.parse().ok()?).ok()
            }),
            size_matched: order.size_matched_shares().unwrap_or_default(),
            status,
        };

        self.fan_out(update);
    }

    /// Deliver a copy of the update to every registered handler, in
    /// registration order. Closed or full handlers are skipped.
    fn fan_out(&self, update: OrderUpdate) {
        let mut handlers = self.handlers.lock();
        handlers.retain(|handler| match handler.try_send(update.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Order-update handler full, dropping delivery");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn release_in_flight(&self, order_id: &OrderId) {
        let mut in_flight = self.in_flight.lock();
        for orders in in_flight.values_mut() {
            orders.retain(|id| id != order_id);
        }
    }

    fn guard_market(&self, market: &MarketSlug) -> Result<()> {
        if self.is_trading_paused() {
            return Err(ExchangeReject::TradingPaused.into());
        }
        let current = self.current_market.read();
        match current.as_ref() {
            Some(current) if current == market => Ok(()),
            Some(current) => Err(ExchangeReject::MarketMismatch {
                submitted: market.to_string(),
                current: current.to_string(),
            }
            .into()),
            None => Err(ExchangeReject::MarketMismatch {
                submitted: market.to_string(),
                current: "<none>".to_string(),
            }
            .into()),
        }
    }

    fn cached_top(&self, token_id: &TokenId) -> Option<CachedTop> {
        self.books.read().get(token_id).copied()
    }

    fn compose_book(&self, market: &Market) -> Option<TopOfBook> {
        let yes = self.cached_top(market.token(Outcome::Yes))?;
        let no = self.cached_top(market.token(Outcome::No))?;

        Some(TopOfBook {
            yes_bid: yes.bid,
            yes_ask: yes.ask,
            no_bid: no.bid,
            no_ask: no.ask,
            yes_ask_size: yes.ask_size,
            no_ask_size: no.ask_size,
            taken_at: yes.taken_at.min(no.taken_at),
        })
    }
}

#[async_trait]
impl TradingPort for TradingService {
    async fn quote_buy_price(&self, token_id: &TokenId, max_price: Pips) -> Result<Pips> {
        let top = self
            .cached_top(token_id)
            .ok_or_else(|| Error::from(ExchangeReject::NoBook(token_id.to_string())))?;

        if top.ask.is_zero() {
            return Err(ExchangeReject::NoBook(token_id.to_string()).into());
        }
        if top.ask > max_price {
            return Err(ExchangeReject::PriceAboveCap {
                ask_pips: top.ask.pips(),
                cap_pips: max_price.pips(),
            }
            .into());
        }
        Ok(top.ask)
    }

    async fn place_order(&self, market: &MarketSlug, args: OrderArgs) -> Result<OrderId> {
        self.guard_market(market)?;

        let order_id = self.submitter.place_fast(&args).await?;
        self.in_flight
            .lock()
            .entry(market.clone())
            .or_default()
            .push(order_id.clone());

        debug!(
            market = %market,
            order_id = %order_id,
            side = %args.side,
            size = %args.size,
            price = %args.price,
            "Order in flight"
        );
        Ok(order_id)
    }

    async fn execute_multi_leg(
        &self,
        market: &MarketSlug,
        legs: Vec<OrderArgs>,
        parallel: bool,
    ) -> Vec<Result<OrderId>> {
        if let Err(e) = self.guard_market(market) {
            warn!(market = %market, error = %e, "Multi-leg rejected by market guard");
            return legs.into_iter().map(|_| Err(self_error(&e))).collect();
        }

        if parallel {
            let futures = legs
                .into_iter()
                .map(|leg| self.place_order(market, leg))
                .collect::<Vec<_>>();
            futures_util::future::join_all(futures).await
        } else {
            let mut results = Vec::new();
            for leg in legs {
                results.push(self.place_order(market, leg).await);
            }
            results
        }
    }

    async fn cancel_orders_for_market(&self, market: &MarketSlug) -> Result<usize> {
        let orders = self.in_flight.lock().remove(market).unwrap_or_default();
        let mut canceled = 0usize;

        for order_id in orders {
            match self.submitter_rest().cancel_order(&order_id).await {
                Ok(true) => canceled += 1,
                Ok(false) => {}
                Err(e) => warn!(order_id = %order_id, error = %e, "Cancel failed"),
            }
        }

        info!(market = %market, canceled, "Canceled open orders for market");
        Ok(canceled)
    }

    fn top_of_book(&self, market: &Market) -> Result<(TopOfBook, BookSource)> {
        let book = self
            .compose_book(market)
            .ok_or_else(|| Error::from(ExchangeReject::NoBook(market.slug().to_string())))?;

        let age = chrono::Utc::now().timestamp() - book.taken_at;
        if age > BOOK_MAX_AGE_SECS {
            return Err(Error::Connection(format!(
                "book for {} is {age}s stale",
                market.slug()
            )));
        }

        Ok((book, BookSource::Websocket))
    }

    fn market_quality(&self, market: &Market) -> Result<MarketQuality> {
        let (book, _) = self.top_of_book(market)?;
        Ok(assess_quality(
            &book,
            chrono::Utc::now().timestamp(),
            self.min_quality_size,
            BOOK_MAX_AGE_SECS,
        ))
    }

    fn open_positions(&self) -> HashMap<TokenId, Decimal> {
        self.positions.read().clone()
    }

    fn register_order_update_handler(&self) -> mpsc::Receiver<OrderUpdate> {
        let (tx, rx) = mpsc::channel(ORDER_UPDATE_CAPACITY);
        self.handlers.lock().push(tx);
        rx
    }
}

impl TradingService {
    fn submitter_rest(&self) -> &crate::core::exchange::RestClient {
        self.submitter.rest()
    }
}

/// Clone-ish conversion for fanning one guard error across legs.
fn self_error(e: &Error) -> Error {
    match e {
        Error::Reject(reject) => Error::Reject(reject.clone()),
        other => Error::Strategy(other.to_string()),
    }
}
