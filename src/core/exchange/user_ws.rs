//! Authenticated user websocket client.
//!
//! Same reconnect and heartbeat discipline as the market feed, with two
//! layers of authentication: HMAC headers on the upgrade request and a
//! JSON auth frame once connected. Only `trade` and `order` messages are
//! consumed; everything else forwards on the generic channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

use super::auth::{self, ApiCreds};
use super::messages::{UserSubscribeMessage, UserWsMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PING_INTERVAL: Duration = Duration::from_secs(10);
const PONG_TIMEOUT: Duration = Duration::from_secs(30);
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The signed path on the upgrade request.
const USER_WS_PATH: &str = "/ws/user";

/// Authenticated user-feed client.
pub struct UserWsClient {
    url: String,
    address: String,
    creds: ApiCreds,
    /// Condition ids whose orders and fills we want.
    markets: Arc<RwLock<Vec<String>>>,
    events: mpsc::Sender<UserWsMessage>,
    /// Non-trade/order frames forward here undecoded.
    other: mpsc::Sender<String>,
    errors: mpsc::Sender<Error>,
    max_reconnect_attempts: u32,
}

impl UserWsClient {
    pub fn new(
        url: impl Into<String>,
        address: impl Into<String>,
        creds: ApiCreds,
        events: mpsc::Sender<UserWsMessage>,
        other: mpsc::Sender<String>,
        errors: mpsc::Sender<Error>,
        max_reconnect_attempts: u32,
    ) -> Self {
        Self {
            url: url.into(),
            address: address.into(),
            creds,
            markets: Arc::new(RwLock::new(Vec::new())),
            events,
            other,
            errors,
            max_reconnect_attempts,
        }
    }

    /// Replace the watched market set; applied on the next (re)connect.
    pub fn set_markets(&self, condition_ids: Vec<String>) {
        *self.markets.write() = condition_ids;
    }

    /// Run until canceled or the reconnect budget is exhausted.
    ///
    /// Exhaustion emits a terminal error on the error channel and leaves
    /// the market set intact for a manual restart.
    pub async fn run(self, cancel: CancellationToken) {
        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return;
            }

            match self.run_connection(&cancel).await {
                Ok(()) => return, // clean stop
                Err(e) => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %e, "User feed connection lost");

                    if attempts >= self.max_reconnect_attempts {
                        error!(attempts, "User feed reconnect budget exhausted, stopping");
                        let _ = self
                            .errors
                            .send(Error::Connection(format!(
                                "user feed gave up after {attempts} attempts: {e}"
                            )))
                            .await;
                        return;
                    }
                }
            }

            let delay = RECONNECT_BASE_DELAY
                .saturating_mul(attempts)
                .min(RECONNECT_MAX_DELAY);
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_connection(&self, cancel: &CancellationToken) -> Result<()> {
        let request = self.upgrade_request()?;
        info!(url = %self.url, "Connecting to user feed");
        let (mut ws, response) = connect_async(request).await?;
        info!(status = %response.status(), "User feed connected");

        // Post-connect auth + market subscription frame.
        let subscribe =
            UserSubscribeMessage::new(&self.creds, self.markets.read().clone());
        ws.send(Message::Text(serde_json::to_string(&subscribe)?))
            .await?;

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
                        self.dispatch(text).await;
                    }
                    Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                    Some(Ok(Message::Close(frame))) => {
                        return Err(Error::Connection(format!("server closed: {frame:?}")));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(Error::Connection("user stream ended".into())),
                },
            }
        }
    }

    /// Upgrade request carrying the HMAC header set over
    /// `timestamp || "GET" || "/ws/user"`.
    fn upgrade_request(&self) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let timestamp = chrono::Utc::now().timestamp();
        let headers =
            auth::l2_headers(&self.address, &self.creds, timestamp, "GET", USER_WS_PATH, "")?;

        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in headers.pairs() {
            request.headers_mut().insert(
                name,
                value
                    .parse()
                    .map_err(|_| Error::Auth(format!("header {name} not encodable")))?,
            );
        }
        Ok(request)
    }

    async fn dispatch(&self, text: String) {
        match serde_json::from_str::<UserWsMessage>(&text) {
            Ok(UserWsMessage::Other) => {
                let _ = self.other.try_send(text);
            }
            Ok(message) => {
                if self.events.send(message).await.is_err() {
                    debug!("User event channel closed");
                }
            }
            Err(e) => {
                warn!(error = %e, raw = %text, "Failed to parse user message");
            }
        }
    }

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
