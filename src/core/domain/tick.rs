//! Rolling spot-price tape per asset.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One spot-price observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTick {
    pub price: f64,
    pub at: Instant,
}

/// Rolling window of ticks, pruned to a fixed retention horizon.
#[derive(Debug)]
pub struct TickWindow {
    ticks: VecDeque<PriceTick>,
    retention: Duration,
}

impl TickWindow {
    /// Retention horizon for the tape.
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            ticks: VecDeque::new(),
            retention,
        }
    }

    /// Push a tick and evict everything older than the retention horizon.
    pub fn push(&mut self, tick: PriceTick) {
        self.ticks.push_back(tick);
        let cutoff = tick.at.checked_sub(self.retention);
        if let Some(cutoff) = cutoff {
            while self
                .ticks
                .front()
                .is_some_and(|t| t.at < cutoff)
            {
                self.ticks.pop_front();
            }
        }
    }

    /// Latest observation, if any.
    #[must_use]
    pub fn last(&self) -> Option<PriceTick> {
        self.ticks.back().copied()
    }

    /// Basis-point change between the last tick and the oldest tick no
    /// older than `window` before it: `round((last - oldest)/oldest * 1e4)`.
    ///
    /// Returns `None` with fewer than two usable ticks or a non-positive
    /// reference price.
    #[must_use]
    pub fn change_bps(&self, window: Duration) -> Option<i64> {
        let last = self.ticks.back()?;
        let oldest = match last.at.checked_sub(window) {
            Some(cutoff) => self.ticks.iter().find(|t| t.at >= cutoff)?,
            // Clock too young to subtract from: the whole tape is in range.
            None => self.ticks.front()?,
        };
        if std::ptr::eq(oldest, last) || oldest.price <= 0.0 {
            return None;
        }

        let ratio = (last.price - oldest.price) / oldest.price;
        Some((ratio * 10_000.0).round() as i64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

impl Default for TickWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETENTION)
    }
}
