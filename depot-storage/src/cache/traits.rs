//! Refresh subscriptions and cache statistics.

use async_trait::async_trait;
use depot_core::DepotResult;
use serde::Serialize;

use super::key::CacheKey;

/// Source of fresh values for a subscribed cache key.
///
/// The cache calls [`Refresher::refresh`] when a subscribed entry has
/// outlived the refresh interval. Errors leave the previous value in place.
#[async_trait]
pub trait Refresher<V>: Send + Sync {
    async fn refresh(&self, key: &CacheKey) -> DepotResult<V>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from a fresh entry.
    pub hits: u64,
    /// Reads that found no usable entry.
    pub misses: u64,
    /// Successful refreshes of stale entries.
    pub refreshes: u64,
    /// Refreshes that failed and fell back to the stale value.
    pub refresh_failures: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of keys with a refresh subscription.
    pub subscriptions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
