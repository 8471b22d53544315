//! Market-data websocket client.
//!
//! Maintains a subscription set over reconnects: every reconnect replays
//! the entire set in batches of at most
//! [`MarketSubscribeMessage::BATCH_LIMIT`] assets per frame. Liveness is
//! application-level - the server speaks text `"PING"`/`"PONG"` rather
//! than control frames - and a missing pong for 30 s forces a redial.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

use super::messages::{MarketSubscribeMessage, MarketWsMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Interval between outgoing text pings.
const PING_INTERVAL: Duration = Duration::from_secs(10);

/// A connection with no pong for this long is dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(30);

/// Base reconnect delay, multiplied by the attempt count.
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Reconnect delay ceiling.
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Drain budget after sending a close frame.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection lifecycle state, observable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Subscribed,
    Reconnecting,
}

/// Split a subscription set into server-sized subscribe frames.
#[must_use]
pub fn subscription_batches(asset_ids: &[String]) -> Vec<Vec<String>> {
    asset_ids
        .chunks(MarketSubscribeMessage::BATCH_LIMIT)
        .map(<[String]>::to_vec)
        .collect()
}

/// Reconnecting market websocket client.
pub struct MarketWsClient {
    url: String,
    subscriptions: Arc<RwLock<Vec<String>>>,
    state: Arc<RwLock<ConnState>>,
    events: mpsc::Sender<MarketWsMessage>,
    errors: mpsc::Sender<Error>,
    max_reconnect_attempts: u32,
}

impl MarketWsClient {
    pub fn new(
        url: impl Into<String>,
        events: mpsc::Sender<MarketWsMessage>,
        errors: mpsc::Sender<Error>,
        max_reconnect_attempts: u32,
    ) -> Self {
        Self {
            url: url.into(),
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            state: Arc::new(RwLock::new(ConnState::Disconnected)),
            events,
            errors,
            max_reconnect_attempts,
        }
    }

    /// Replace the subscription set; applied on the next (re)connect.
    pub fn set_subscriptions(&self, asset_ids: Vec<String>) {
        *self.subscriptions.write() = asset_ids;
    }

    /// Current subscription set (shared-read, owner-write).
    #[must_use]
    pub fn subscriptions(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.subscriptions)
    }

    #[must_use]
    pub fn state(&self) -> ConnState {
        *self.state.read()
    }

    /// Run until canceled or the reconnect budget is exhausted.
    ///
    /// Exhaustion emits a terminal error on the error channel and leaves
    /// the subscription set intact for a manual restart.
    pub async fn run(self, cancel: CancellationToken) {
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            *self.state.write() = if attempts == 0 {
                ConnState::Connecting
            } else {
                ConnState::Reconnecting
            };

            match self.run_connection(&cancel).await {
                Ok(()) => break, // clean stop
                Err(e) => {
                    attempts += 1;
                    warn!(
                        attempt = attempts,
                        error = %e,
                        "Market feed connection lost"
                    );

                    if attempts >= self.max_reconnect_attempts {
                        error!(
                            attempts,
                            "Market feed reconnect budget exhausted, stopping"
                        );
                        let _ = self
                            .errors
                            .send(Error::Connection(format!(
                                "market feed gave up after {attempts} attempts: {e}"
                            )))
                            .await;
                        break;
                    }

                    let delay = RECONNECT_BASE_DELAY
                        .saturating_mul(attempts)
                        .min(RECONNECT_MAX_DELAY);
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        *self.state.write() = ConnState::Disconnected;
    }

    /// One connection: dial, subscribe everything, pump messages.
    async fn run_connection(&self, cancel: &CancellationToken) -> Result<()> {
        info!(url = %self.url, "Connecting to market feed");
        let (mut ws, response) = connect_async(&self.url).await?;
        info!(status = %response.status(), "Market feed connected");

        self.send_subscriptions(&mut ws).await?;
        *self.state.write() = ConnState::Subscribed;

        let mut ping_timer = tokio::time::interval(PING_INTERVAL);
        ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_pong = Instant::now();

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.close_gracefully(ws).await;
                    return Ok(());
                }
                _ = ping_timer.tick() => {
                    if last_pong.elapsed() > PONG_TIMEOUT {
                        return Err(Error::Connection("pong timeout".into()));
                    }
                    ws.send(Message::Text("PING".into())).await?;
                }
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if text == "PONG" {
                            last_pong = Instant::now();
                            continue;
                        }
                        self.dispatch(&text).await;
                    }
                    Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                    Some(Ok(Message::Close(frame))) => {
                        return Err(Error::Connection(format!("server closed: {frame:?}")));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(Error::Connection("market stream ended".into())),
                },
            }
        }
    }

    /// Send the entire current subscription set, batched.
    async fn send_subscriptions(&self, ws: &mut WsStream) -> Result<()> {
        let snapshot = self.subscriptions.read().clone();
        if snapshot.is_empty() {
            return Ok(());
        }

        let batches = subscription_batches(&snapshot);
        info!(
            assets = snapshot.len(),
            frames = batches.len(),
            "Subscribing to market feed"
        );

        for batch in batches {
            let frame = MarketSubscribeMessage::new(batch);
            ws.send(Message::Text(serde_json::to_string(&frame)?)).await?;
        }
        Ok(())
    }

    /// Parse and forward one frame; malformed frames are dropped.
    async fn dispatch(&self, text: &str) {
        match serde_json::from_str::<MarketWsMessage>(text) {
            Ok(MarketWsMessage::Unknown) => {}
            Ok(message) => {
                if self.events.send(message).await.is_err() {
                    debug!("Market event channel closed");
                }
            }
            Err(e) => {
                // Some frames arrive as arrays of events.
                if let Ok(batch) = serde_json::from_str::<Vec<MarketWsMessage>>(text) {
                    for message in batch {
                        if !matches!(message, MarketWsMessage::Unknown)
                            && self.events.send(message).await.is_err()
                        {
                            return;
                        }
                    }
                } else {
                    warn!(error = %e, raw = %text, "Failed to parse market message");
                }
            }
        }
    }

    /// Close with the normal-closure code and drain briefly.
    async fn close_gracefully(&self, mut ws: WsStream) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client stop".into(),
        };
        if ws.send(Message::Close(Some(frame))).await.is_err() {
            return;
        }

        let drain = async {
            while let Some(message) = ws.next().await {
                if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        };
        if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, drain).await.is_err() {
            debug!("Close drain timed out, releasing socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn batches_cap_at_one_hundred() {
        let batches = subscription_batches(&ids(120));

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 20);
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 120);
    }

    #[test]
    fn small_sets_fit_one_batch() {
        assert_eq!(subscription_batches(&ids(3)).len(), 1);
        assert!(subscription_batches(&[]).is_empty());
    }

    #[tokio::test]
    async fn subscription_set_survives_replacement() {
        let (events, _rx) = mpsc::channel(8);
        let (errors, _erx) = mpsc::channel(8);
        let client = MarketWsClient::new("wss://example.invalid/ws/market", events, errors, 3);

        client.set_subscriptions(ids(120));
        assert_eq!(client.subscriptions().read().len(), 120);

        client.set_subscriptions(ids(5));
        assert_eq!(client.subscriptions().read().len(), 5);
        assert_eq!(client.state(), ConnState::Disconnected);
    }
}
