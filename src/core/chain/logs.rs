//! Confirmed `OrderFilled` log subscriber.
//!
//! Subscribes to logs on both exchange contracts filtered by the
//! `OrderFilled` topic and emits one settled [`TradeEvent`] per log.
//! Unlike the mempool path the decode here is unambiguous: topics carry
//! the maker and taker, data carries the asset ids and filled amounts.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::domain::{ContractKind, Role, Side, TradeEvent};
use crate::error::{Error, Result};

use super::contracts::{NEG_RISK_EXCHANGE, ORDER_FILLED_TOPIC, STANDARD_EXCHANGE};
use super::mempool::FollowedAddresses;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// One raw log off the subscription, already field-split.
#[derive(Debug, Clone)]
struct RawLog {
    address: Address,
    topics: Vec<Vec<u8>>,
    data: Vec<u8>,
    tx_hash: String,
    log_index: u64,
}

impl RawLog {
    fn from_value(value: &Value) -> Option<Self> {
        let address = value.get("address")?.as_str()?.parse().ok()?;
        let topics = value
            .get("topics")?
            .as_array()?
            .iter()
            .map(|t| hex::decode(t.as_str()?.trim_start_matches("0x")).ok())
            .collect::<Option<Vec<_>>>()?;
        let data = hex::decode(value.get("data")?.as_str()?.trim_start_matches("0x")).ok()?;
        let tx_hash = value.get("transactionHash")?.as_str()?.to_string();
        let log_index = u64::from_str_radix(
            value.get("logIndex")?.as_str()?.trim_start_matches("0x"),
            16,
        )
        .ok()?;

        Some(Self {
            address,
            topics,
            data,
            tx_hash,
            log_index,
        })
    }
}

/// Decode one `OrderFilled` log into events for watched parties.
///
/// Topic layout: `[event_sig, order_hash, maker, taker]`. Data layout:
/// `[maker_asset_id, taker_asset_id, maker_amount_filled,
/// taker_amount_filled, fee]`, 32 bytes each. A zero maker asset id means
/// the maker paid stablecoin, i.e. the maker side of the fill is a BUY.
fn decode_order_filled(
    log: &RawLog,
    followed: &FollowedAddresses,
    detected_at: i64,
) -> Vec<TradeEvent> {
    if log.topics.len() < 4 || log.data.len() < 5 * 32 {
        return Vec::new();
    }

    let contract = if log.address == NEG_RISK_EXCHANGE {
        ContractKind::NegRisk
    } else {
        ContractKind::Standard
    };

    let maker = Address::from_slice(&log.topics[2][12..]);
    let taker = Address::from_slice(&log.topics[3][12..]);

    let maker_asset = U256::from_be_slice(&log.data[0..32]);
    let taker_asset = U256::from_be_slice(&log.data[32..64]);
    let maker_filled = u128_word(&log.data[64..96]);
    let taker_filled = u128_word(&log.data[96..128]);

    let maker_side = if maker_asset.is_zero() {
        Side::Buy
    } else {
        Side::Sell
    };
    let token_id = if maker_asset.is_zero() {
        taker_asset
    } else {
        maker_asset
    };

    let mut events = Vec::new();

    if let Some(party) = followed.matches(maker) {
        // Maker buying: shares arrive on the taker leg of the fill.
        let fill_amount = match maker_side {
            Side::Buy => taker_filled,
            Side::Sell => maker_filled,
        };
        events.push(TradeEvent {
            tx_hash: log.tx_hash.clone(),
            log_index: Some(log.log_index),
            party,
            role: Role::Maker,
            side: maker_side,
            token_id: token_id.to_string(),
            maker_amount: maker_filled,
            taker_amount: taker_filled,
            fill_amount,
            order_salt: 0,
            detected_at,
            contract,
        });
    }

    if let Some(party) = followed.matches(taker) {
        let taker_side = match maker_side {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        };
        let fill_amount = match taker_side {
            Side::Buy => maker_filled,
            Side::Sell => taker_filled,
        };
        events.push(TradeEvent {
            tx_hash: log.tx_hash.clone(),
            log_index: Some(log.log_index),
            party,
            role: Role::Taker,
            side: taker_side,
            // The taker trades the same outcome token from the other side.
            token_id: token_id.to_string(),
            maker_amount: taker_filled,
            taker_amount: maker_filled,
            fill_amount,
            order_salt: 0,
            detected_at,
            contract,
        });
    }

    events
}

fn u128_word(word: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..32]);
    u128::from_be_bytes(buf)
}

/// Confirmed-log watcher over a WebSocket JSON-RPC endpoint.
pub struct LogWatcher {
    ws_url: String,
    followed: FollowedAddresses,
    events: mpsc::Sender<TradeEvent>,
}

impl LogWatcher {
    pub fn new(
        ws_url: impl Into<String>,
        followed: FollowedAddresses,
        events: mpsc::Sender<TradeEvent>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            followed,
            events,
        }
    }

    /// Run until canceled, redialing on socket errors.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            if let Err(e) = self.run_connection(&cancel).await {
                warn!(error = %e, "Log subscription lost, redialing");
            } else {
                return; // canceled
            }

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    async fn run_connection(&self, cancel: &CancellationToken) -> Result<()> {
        let (mut ws, _) = connect_async(&self.ws_url).await?;

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": [
                "logs",
                {
                    "address": [format!("{STANDARD_EXCHANGE:?}"), format!("{NEG_RISK_EXCHANGE:?}")],
                    "topics": [format!("{ORDER_FILLED_TOPIC:?}")],
                },
            ],
        });
        ws.send(Message::Text(subscribe.to_string())).await?;
        info!(url = %self.ws_url, "Subscribed to OrderFilled logs");

        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                msg = ws.next() => msg,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.handle_frame(&text).await?,
                Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(frame))) => {
                    return Err(Error::Connection(format!("server closed: {frame:?}")));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::Connection("log stream ended".into())),
            }
        }
    }

    async fn handle_frame(&self, text: &str) -> Result<()> {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Ok(());
        };
        let Some(result) = value.pointer("/params/result") else {
            return Ok(()); // subscription ack
        };
        let Some(log) = RawLog::from_value(result) else {
            debug!("Unparseable log frame dropped");
            return Ok(());
        };

        let detected_at = chrono::Utc::now().timestamp_millis();
        for event in decode_order_filled(&log, &self.followed, detected_at) {
            debug!(
                tx_hash = %event.tx_hash,
                log_index = ?event.log_index,
                party = %event.party,
                side = %event.side,
                "Confirmed fill"
            );
            if self.events.send(event).await.is_err() {
                return Err(Error::Connection("trade event channel closed".into()));
            }
        }
        Ok(())
    }
}
