//! Device performance cache
//!
//! Keeps a running history of observed response latencies per address and
//! derives the adaptive per-attempt timeout and retry budget from the mean.
//! Stale entries (older than the freshness window) are ignored by the policy
//! but the samples stay in place until an explicit clear.

use crate::policy::{self, FRESHNESS_WINDOW};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct PerformanceEntry {
    /// Append-only within the entry's lifetime.
    samples: Vec<Duration>,
    /// Mean of `samples`; recomputed on every append.
    average: Option<Duration>,
    last_updated: SystemTime,
}

impl PerformanceEntry {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
            average: None,
            last_updated: SystemTime::now(),
        }
    }

    fn push(&mut self, sample: Duration) {
        self.samples.push(sample);
        let total: Duration = self.samples.iter().sum();
        self.average = Some(total / self.samples.len() as u32);
        self.last_updated = SystemTime::now();
    }

    fn is_stale(&self, window: Duration) -> bool {
        self.last_updated.elapsed().unwrap_or(Duration::ZERO) > window
    }
}

/// Per-address latency history with policy-facing derived values.
#[derive(Debug)]
pub struct PerformanceCache {
    entries: RwLock<HashMap<String, PerformanceEntry>>,
    freshness: Duration,
}

impl Default for PerformanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceCache {
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

    /// Append an observed response latency for `address`, creating the entry
    /// if absent and recomputing the running mean.
    pub async fn record_sample(&self, address: &str, sample: Duration) {
        let mut entries = self.entries.write().await;
        entries
            .entry(address.to_string())
            .or_insert_with(PerformanceEntry::new)
            .push(sample);
    }

    /// Staleness-filtered mean response time for `address`.
    pub async fn average(&self, address: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries
            .get(address)
            .filter(|entry| !entry.is_stale(self.freshness))
            .and_then(|entry| entry.average)
    }

    /// Effective per-attempt timeout for `address` given the configured
    /// default.
    pub async fn derived_timeout(&self, address: &str, default: Duration) -> Duration {
        policy::effective_timeout(self.average(address).await, default)
    }

    /// Effective retry budget for `address` given the configured base.
    pub async fn derived_retry_budget(&self, address: &str, base: u32) -> u32 {
        policy::retry_budget(self.average(address).await, base)
    }

    /// Number of samples recorded for `address`, staleness ignored.
    pub async fn sample_count(&self, address: &str) -> usize {
        let entries = self.entries.read().await;
        entries.get(address).map_or(0, |entry| entry.samples.len())
    }

    /// Drop all entries. Manual reset only; staleness never deletes.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
