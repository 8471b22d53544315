//! External spot-price momentum feed.
//!
//! Connects to a crypto spot websocket, keeps a 60 s rolling tape per
//! symbol, and emits a debounced [`MomentumSignal`] whenever the
//! basis-point move over the lookback window clears the threshold.
//! Signals are load-shed, not queued: a full downstream channel drops
//! the signal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::domain::{PriceTick, TickWindow};
use crate::error::{Error, Result};

/// Output channel capacity; overflow is dropped.
pub const SIGNAL_CHANNEL_CAPACITY: usize = 1024;

/// Minimum spacing between signals for one asset.
const DEBOUNCE: Duration = Duration::from_millis(300);

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// A threshold-clearing spot move.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumSignal {
    pub asset: String,
    /// `+1` up, `-1` down.
    pub dir: i8,
    pub move_bps: i64,
    pub fired_at: Instant,
    pub window: Duration,
    pub threshold_bps: i64,
}

/// Per-symbol tape plus debounce bookkeeping.
struct SymbolState {
    window: TickWindow,
    last_fired: Option<Instant>,
}

impl SymbolState {
    fn new() -> Self {
        Self {
            window: TickWindow::default(),
            last_fired: None,
        }
    }
}

/// Momentum feed over an external spot websocket.
pub struct MomentumFeed {
    ws_url: String,
    symbols: Vec<String>,
    window: Duration,
    threshold_bps: i64,
    signals: mpsc::Sender<MomentumSignal>,
    states: HashMap<String, SymbolState>,
}

impl MomentumFeed {
    /// Create a feed and its output channel.
    #[must_use]
    pub fn new(
        ws_url: impl Into<String>,
        symbols: Vec<String>,
        window: Duration,
        threshold_bps: i64,
    ) -> (Self, mpsc::Receiver<MomentumSignal>) {
        let (signals, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        (
            Self {
                ws_url: ws_url.into(),
                symbols,
                window,
                threshold_bps,
                signals,
                states: HashMap::new(),
            },
            rx,
        )
    }

    /// Run until canceled. With no symbols configured the feed logs a
    /// warning and idles so the rest of the system runs un-signaled.
    pub async fn run(mut self, cancel: CancellationToken) {
        if self.symbols.is_empty() {
            warn!("Momentum feed has no symbols configured, idling");
            cancel.cancelled().await;
            return;
        }

        loop {
            if cancel.is_cancelled() {
                return;
            }

            if let Err(e) = self.run_connection(&cancel).await {
                warn!(error = %e, "Momentum feed connection lost, redialing");
            } else {
                return; // canceled
            }

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    async fn run_connection(&mut self, cancel: &CancellationToken) -> Result<()> {
        let streams: Vec<String> = self
            .symbols
            .iter()
            .map(|s| format!("{}@trade", s.to_ascii_lowercase()))
            .collect();
        let url = format!("{}/stream?streams={}", self.ws_url, streams.join("/"));

        let (mut ws, _) = connect_async(&url).await?;
        info!(symbols = self.symbols.len(), "Momentum feed connected");

        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                msg = ws.next() => msg,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.handle_tick(&text),
                Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(frame))) => {
                    return Err(Error::Connection(format!("server closed: {frame:?}")));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Err(Error::Connection("momentum stream ended".into())),
            }
        }
    }

    /// Process one trade frame off the combined stream.
    fn handle_tick(&mut self, text: &str) {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return;
        };
        let Some(data) = value.get("data") else {
            return;
        };
        let (Some(symbol), Some(price)) = (
            data.get("s").and_then(Value::as_str),
            data.get("p")
                .and_then(Value::as_str)
                .and_then(|p| p.parse::<f64>().ok()),
        ) else {
            return;
        };

        self.observe(symbol.to_string(), price, Instant::now());
    }

    /// Record a tick and emit a signal when the move clears the gate.
    fn observe(&mut self, symbol: String, price: f64, at: Instant) {
        let window_len = self.window;
        let threshold = self.threshold_bps;

        let state = self
            .states
            .entry(symbol.clone())
            .or_insert_with(SymbolState::new);
        state.window.push(PriceTick { price, at });

        let Some(move_bps) = state.window.change_bps(window_len) else {
            return;
        };
        if move_bps.abs() < threshold {
            return;
        }

        // Per-asset debounce.
        if state
            .last_fired
            .is_some_and(|last| at.duration_since(last) < DEBOUNCE)
        {
            return;
        }
        state.last_fired = Some(at);

        let signal = MomentumSignal {
            asset: symbol,
            dir: if move_bps > 0 { 1 } else { -1 },
            move_bps,
            fired_at: at,
            window: window_len,
            threshold_bps: threshold,
        };

        // Load-shed rather than queue: a stale momentum signal is worse
        // than none.
        if let Err(e) = self.signals.try_send(signal) {
            debug!(error = %e, "Momentum channel full, signal dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(threshold_bps: i64) -> (MomentumFeed, mpsc::Receiver<MomentumSignal>) {
        MomentumFeed::new(
            "wss://example.invalid",
            vec!["BTCUSDT".into()],
            Duration::from_secs(30),
            threshold_bps,
        )
    }

    #[test]
    fn emits_signal_when_threshold_cleared() {
        let (mut feed, mut rx) = feed(50);
        let base = Instant::now();

        feed.observe("BTCUSDT".into(), 100_000.0, base);
        feed.observe(
            "BTCUSDT".into(),
            101_000.0,
            base + Duration::from_secs(5),
        );

        let signal = rx.try_recv().expect("signal");
        assert_eq!(signal.asset, "BTCUSDT");
        assert_eq!(signal.dir, 1);
        assert_eq!(signal.move_bps, 100);
    }

    #[test]
    fn small_moves_are_ignored() {
        let (mut feed, mut rx) = feed(50);
        let base = Instant::now();

        feed.observe("BTCUSDT".into(), 100_000.0, base);
        feed.observe(
            "BTCUSDT".into(),
            100_100.0,
            base + Duration::from_secs(5),
        );

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn debounce_suppresses_rapid_refires() {
        let (mut feed, mut rx) = feed(50);
        let base = Instant::now();

        feed.observe("BTCUSDT".into(), 100_000.0, base);
        feed.observe("BTCUSDT".into(), 101_000.0, base + Duration::from_millis(400));
        feed.observe("BTCUSDT".into(), 102_000.0, base + Duration::from_millis(500));
        feed.observe("BTCUSDT".into(), 103_000.0, base + Duration::from_millis(900));

        assert!(rx.try_recv().is_ok());
        // 500 ms tick was inside the debounce window; 900 ms fires again.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn downward_moves_signal_negative_direction() {
        let (mut feed, mut rx) = feed(50);
        let base = Instant::now();

        feed.observe("BTCUSDT".into(), 100_000.0, base);
        feed.observe("BTCUSDT".into(), 99_000.0, base + Duration::from_secs(5));

        let signal = rx.try_recv().expect("signal");
        assert_eq!(signal.dir, -1);
        assert_eq!(signal.move_bps, -100);
    }
}
