//! Pending-transaction subscriber and trade extraction.
//!
//! Subscribes to the node's `newPendingTransactions` feed, fetches the
//! calldata of every hash touching a known exchange contract, and emits
//! one [`TradeEvent`] per watched party per call the moment the fill is
//! visible in the mempool.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::domain::{ContractKind, Role, TradeEvent};
use crate::error::{Error, Result};

use super::calldata::{self, DecodedCall};
use super::contracts;
use super::rpc::RpcClient;
use super::txcache::TxCache;

/// Delay before redialing the subscription socket.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Read-mostly set of watched addresses, stored as lowercase hex without
/// the `0x` prefix. The mempool decoder reads it on every candidate
/// transaction; writes happen only on configuration changes.
#[derive(Debug, Clone, Default)]
pub struct FollowedAddresses {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl FollowedAddresses {
    #[must_use]
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = addresses
            .into_iter()
            .map(|a| normalize(a.as_ref()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(set)),
        }
    }

    pub fn follow(&self, address: &str) {
        self.inner.write().insert(normalize(address));
    }

    pub fn unfollow(&self, address: &str) {
        self.inner.write().remove(&normalize(address));
    }

    /// Match an on-chain address against the followed set by lowercase
    /// hex suffix. Returns the canonical `0x`-prefixed form on a hit.
    #[must_use]
    pub fn matches(&self, address: Address) -> Option<String> {
        let hex = hex::encode(address.as_slice());
        let set = self.inner.read();
        set.iter()
            .any(|followed| hex.ends_with(followed.as_str()))
            .then(|| format!("0x{hex}"))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

fn normalize(address: &str) -> String {
    address.trim_start_matches("0x").to_ascii_lowercase()
}

/// Extract trade events for every watched party in a decoded call.
///
/// Role assignment follows the call layout: the order at index 0 is the
/// taker of the call and its fill is the taker-shares word; every other
/// order is a maker whose fill sits at `fill_amounts[index - 1]`.
#[must_use]
pub fn events_for_call(
    call: &DecodedCall,
    followed: &FollowedAddresses,
    tx_hash: &str,
    contract: ContractKind,
    detected_at: i64,
) -> Vec<TradeEvent> {
    let mut events = Vec::new();
    let mut matched: HashSet<String> = HashSet::new();

    for (index, order) in call.orders.iter().enumerate() {
        let Some(party) = order.parties().into_iter().find_map(|a| followed.matches(a)) else {
            continue;
        };
        // One event per watched address per call.
        if !matched.insert(party.clone()) {
            continue;
        }

        let (role, fill_amount) = if index == 0 {
            (Role::Taker, call.taker_fill_shares)
        } else {
            let Some(&fill) = call.fill_amounts.get(index - 1) else {
                debug!(tx_hash, index, "No fill amount for maker order, skipping");
                continue;
            };
            (Role::Maker, fill)
        };

        events.push(TradeEvent {
            tx_hash: tx_hash.to_string(),
            log_index: None,
            party,
            role,
            side: order.side,
            token_id: order.token_id.to_string(),
            maker_amount: order.maker_amount,
            taker_amount: order.taker_amount,
            fill_amount,
            order_salt: order.salt,
            detected_at,
            contract,
        });
    }

    events
}

/// Pending-transaction watcher over a WebSocket JSON-RPC endpoint.
pub struct MempoolWatcher {
    ws_url: String,
    backup_ws_url: Option<String>,
    rpc: RpcClient,
    followed: FollowedAddresses,
    cache: Arc<Mutex<TxCache>>,
    events: mpsc::Sender<TradeEvent>,
}

impl MempoolWatcher {
    pub fn new(
        ws_url: impl Into<String>,
        backup_ws_url: Option<String>,
        rpc: RpcClient,
        followed: FollowedAddresses,
        events: mpsc::Sender<TradeEvent>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            backup_ws_url,
            rpc,
            followed,
            cache: Arc::new(Mutex::new(TxCache::new())),
            events,
        }
    }

    /// Shared hash cache, for correlating with the market feed.
    #[must_use]
    pub fn cache(&self) -> Arc<Mutex<TxCache>> {
        Arc::clone(&self.cache)
    }

    /// Run until canceled, redialing on socket errors.
    pub async fn run(self, cancel: CancellationToken) {
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let url = self.pick_url(attempt);
            match self.run_connection(url, &cancel).await {
                Ok(()) => return, // canceled
                Err(e) => {
                    attempt += 1;
                    warn!(url, error = %e, "Pending-tx subscription lost, redialing");
                }
            }

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    fn pick_url(&self, attempt: u32) -> &str {
        match (&self.backup_ws_url, attempt % 2) {
            (Some(backup), 1) => backup,
            _ => &self.ws_url,
        }
    }

    async fn run_connection(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        let (mut ws, _) = connect_async(url).await?;

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newPendingTransactions"],
        });
        ws.send(Message::Text(subscribe.to_string())).await?;
        info!(url, "Subscribed to pending transactions");

        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                msg = ws.next() => msg,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(frame))) => {
                    return Err(Error::Connection(format!("server closed: {frame:?}")));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::Connection("pending-tx stream ended".into())),
            }
        }
    }

    /// Handle one frame off the subscription socket.
    ///
    /// Every hash is cached before any contract gating so the market-feed
    /// path can correlate hashes we never managed to decode. No locks are
    /// held across the fetch; the per-hash work runs on its own task.
    fn handle_frame(&self, text: &str) {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return;
        };
        let Some(tx_hash) = value
            .pointer("/params/result")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            return; // subscription ack or unrelated frame
        };

        if !self.cache.lock().insert(&tx_hash) {
            return;
        }

        let rpc = self.rpc.clone();
        let followed = self.followed.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = fetch_and_decode(&rpc, &followed, &events, &tx_hash).await {
                debug!(tx_hash, error = %e, "Pending tx not decoded");
            }
        });
    }
}

/// Fetch a pending transaction and emit events for watched parties.
async fn fetch_and_decode(
    rpc: &RpcClient,
    followed: &FollowedAddresses,
    events: &mpsc::Sender<TradeEvent>,
    tx_hash: &str,
) -> Result<()> {
    let Some(tx) = rpc.transaction_by_hash(tx_hash).await? else {
        return Ok(()); // dropped from the pool before we fetched it
    };

    let Some(contract) = tx.to_address().and_then(contracts::contract_kind) else {
        return Ok(());
    };

    let Some(raw) = tx.calldata() else {
        return Ok(());
    };
    let Some(call) = calldata::decode(&raw) else {
        // Still cached upstream; the trace fallback can pick it up later.
        return Ok(());
    };

    let detected_at = chrono::Utc::now().timestamp_millis();
    for event in events_for_call(&call, followed, tx_hash, contract, detected_at) {
        debug!(
            tx_hash,
            party = %event.party,
            role = %event.role,
            side = %event.side,
            fill = %event.fill_shares(),
            "Pending trade detected"
        );
        if events.send(event).await.is_err() {
            return Err(Error::Connection("trade event channel closed".into()));
        }
    }

    Ok(())
}
