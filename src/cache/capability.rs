//! TLS capability cache
//!
//! Remembers, per device address, whether an encrypted handshake previously
//! succeeded. Entries older than the freshness window are treated as absent;
//! they are overwritten on each probe and never merged.

use crate::policy::FRESHNESS_WINDOW;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct CapabilityEntry {
    supports_tls: bool,
    recorded_at: SystemTime,
}

impl CapabilityEntry {
    fn is_stale(&self, window: Duration) -> bool {
        self.recorded_at.elapsed().unwrap_or(Duration::ZERO) > window
    }
}

/// Per-address memory of TLS handshake support with a freshness window.
#[derive(Debug)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<String, CapabilityEntry>>,
    freshness: Duration,
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityCache {
    /// Create a cache with the standard 24h freshness window.
    pub fn new() -> Self {
        Self::with_freshness(FRESHNESS_WINDOW)
    }

    /// Create a cache with a custom freshness window.
    pub fn with_freshness(freshness: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness,
        }
    }

    /// Cached TLS support for `address`, or `None` if unknown or stale.
    pub async fn lookup(&self, address: &str) -> Option<bool> {
        let entries = self.entries.read().await;
        entries
            .get(address)
            .filter(|entry| !entry.is_stale(self.freshness))
            .map(|entry| entry.supports_tls)
    }

    /// Record a probe outcome, overwriting any previous entry.
    pub async fn record(&self, address: &str, supports_tls: bool) {
        let mut entries = self.entries.write().await;
        entries.insert(
            address.to_string(),
            CapabilityEntry {
                supports_tls,
                recorded_at: SystemTime::now(),
            },
        );
    }

    /// Drop all entries. Manual reset only; staleness never deletes.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries currently held, stale ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_recorded_value() {
        let cache = CapabilityCache::new();
        assert_eq!(cache.lookup("192.168.1.5").await, None);

        cache.record("192.168.1.5", true).await;
        assert_eq!(cache.lookup("192.168.1.5").await, Some(true));

        cache.record("192.168.1.5", false).await;
        assert_eq!(cache.lookup("192.168.1.5").await, Some(false));
    }

    #[tokio::test]
    async fn stale_entry_behaves_as_absent() {
        let cache = CapabilityCache::with_freshness(Duration::from_millis(10));
        cache.record("192.168.1.5", true).await;
        assert_eq!(cache.lookup("192.168.1.5").await, Some(true));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.lookup("192.168.1.5").await, None);
        // the entry itself is not deleted by staleness
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = CapabilityCache::new();
        cache.record("192.168.1.5", true).await;
        cache.record("192.168.1.6", false).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert_eq!(cache.lookup("192.168.1.5").await, None);

        // idempotent
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
