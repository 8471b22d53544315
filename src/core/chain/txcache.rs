//! Deduplication cache for pending transaction hashes.
//!
//! The node's pending-tx feed replays hashes across reconnects and from
//! both the primary and backup endpoints. The cache bounds memory with an
//! insertion-stamped sweep instead of per-access bookkeeping: every
//! `SWEEP_EVERY` inserts, entries older than the max age are evicted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entries older than this are dropped at sweep time.
pub const MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Inserts between sweeps.
pub const SWEEP_EVERY: u64 = 10_000;

#[derive(Debug)]
pub struct TxCache {
    seen: HashMap<String, Instant>,
    inserts: u64,
    max_age: Duration,
    sweep_every: u64,
}

impl TxCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(MAX_AGE, SWEEP_EVERY)
    }

    #[must_use]
    pub fn with_limits(max_age: Duration, sweep_every: u64) -> Self {
        Self {
            seen: HashMap::new(),
            inserts: 0,
            max_age,
            sweep_every: sweep_every.max(1),
        }
    }

    /// Record a hash. Returns `true` when the hash is new.
    ///
    /// Hashes are normalized to lowercase; the feed is inconsistent about
    /// case across endpoints.
    pub fn insert(&mut self, tx_hash: &str) -> bool {
        let key = tx_hash.to_ascii_lowercase();
        let now = Instant::now();

        self.inserts += 1;
        if self.inserts % self.sweep_every == 0 {
            self.sweep(now);
        }

        self.seen.insert(key, now).is_none()
    }

    /// True when the hash has been seen and not yet swept.
    #[must_use]
    pub fn contains(&self, tx_hash: &str) -> bool {
        self.seen.contains_key(&tx_hash.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn sweep(&mut self, now: Instant) {
        let max_age = self.max_age;
        self.seen
            .retain(|_, inserted| now.duration_since(*inserted) < max_age);
    }
}

impl Default for TxCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new_second_is_not() {
        let mut cache = TxCache::new();
        assert!(cache.insert("0xABC"));
        assert!(!cache.insert("0xabc"));
        assert!(cache.contains("0xAbC"));
    }

    #[test]
    fn sweep_evicts_aged_entries() {
        let mut cache = TxCache::with_limits(Duration::ZERO, 2);
        cache.insert("0x1");
        assert_eq!(cache.len(), 1);
        // Second insert triggers the sweep; the zero max-age drops 0x1.
        cache.insert("0x2");
        assert!(!cache.contains("0x1"));
        assert!(cache.contains("0x2"));
    }

    #[test]
    fn fresh_entries_survive_sweep() {
        let mut cache = TxCache::with_limits(Duration::from_secs(300), 2);
        cache.insert("0x1");
        cache.insert("0x2");
        assert_eq!(cache.len(), 2);
    }
}
