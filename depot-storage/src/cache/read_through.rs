//! Read-through cache with refresh subscriptions.
//!
//! Entries carry the time they were last fetched. Once an entry is older
//! than the configured refresh interval it is stale, and the next read asks
//! the key's subscribed [`Refresher`] for a new value. A failed refresh keeps
//! serving the old value; a stale entry without a subscription reads as a
//! miss.
//!
//! Refreshes of one key are serialized by a per-key async lock. Concurrent
//! readers of a stale key wait for the first refresh and then read its
//! result, so a hot key costs one store round-trip per interval instead of
//! one per reader.
//!
//! The tables sit behind `std::sync::RwLock`s. Guards are only held for
//! short synchronous sections and never across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use depot_core::{DepotConfig, DepotError, DepotResult, DEFAULT_REFRESH_INTERVAL_MS};
use tokio::sync::Mutex as RefreshLock;

use super::freshness::CacheRead;
use super::key::CacheKey;
use super::traits::{CacheStats, Refresher};

/// Configuration for the read-through cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Age at which an entry becomes stale and is refreshed on next read.
    pub refresh_interval: Duration,
    /// Log cache activity at info level instead of debug.
    pub verbose: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            verbose: false,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Enable or disable verbose logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl From<&DepotConfig> for CacheConfig {
    fn from(config: &DepotConfig) -> Self {
        Self {
            refresh_interval: config.refresh_interval(),
            verbose: config.verbosity,
        }
    }
}

/// Outcome of one [`ReadThroughCache::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    refreshed_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            refreshed_at: Utc::now(),
        }
    }

    fn is_stale(&self, interval: Duration, now: DateTime<Utc>) -> bool {
        let age = (now - self.refreshed_at).to_std().unwrap_or(Duration::ZERO);
        age >= interval
    }
}

/// Emit a cache event at info level when verbose, debug otherwise.
macro_rules! cache_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Read-through cache keyed by [`CacheKey`].
pub struct ReadThroughCache<V> {
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, Entry<V>>>,
    subscriptions: RwLock<HashMap<CacheKey, Arc<dyn Refresher<V>>>>,
    refresh_locks: Mutex<HashMap<CacheKey, Arc<RefreshLock<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl<V> ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read a value, refreshing it through its subscription when stale.
    ///
    /// Returns `Ok(None)` on a miss: no entry, or a stale entry nobody
    /// subscribed to.
    pub async fn get(&self, key: &CacheKey) -> DepotResult<Option<CacheRead<V>>> {
        let entry = self.entry(key)?;
        let Some(entry) = entry else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            cache_event!(self.config.verbose, key = %key, "Cache miss");
            return Ok(None);
        };

        if !entry.is_stale(self.config.refresh_interval, Utc::now()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(CacheRead::hit(entry.value, entry.refreshed_at)));
        }

        let Some(refresher) = self.subscription(key)? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            cache_event!(self.config.verbose, key = %key, "Stale entry without subscription");
            return Ok(None);
        };

        let lock = self.refresh_lock(key)?;
        let _refreshing = lock.lock().await;
        // Another reader may have refreshed the key while we waited.
        if let Some(current) = self.entry(key)? {
            if !current.is_stale(self.config.refresh_interval, Utc::now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(CacheRead::hit(current.value, current.refreshed_at)));
            }
        }

        match self.refresh_with(key, refresher.as_ref()).await {
            Ok(value) => Ok(Some(CacheRead::fetched(value))),
            Err(DepotError::LockPoisoned) => Err(DepotError::LockPoisoned),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache refresh failed, serving stale value");
                Ok(Some(CacheRead::stale(entry.value, entry.refreshed_at)))
            }
        }
    }

    /// Read a value without refreshing or touching the statistics.
    pub fn peek(&self, key: &CacheKey) -> DepotResult<Option<CacheRead<V>>> {
        Ok(self
            .entry(key)?
            .map(|entry| CacheRead::hit(entry.value, entry.refreshed_at)))
    }

    /// Refresh a subscribed key now, regardless of its age.
    ///
    /// Returns `Ok(None)` if the key has no subscription. Refresh errors
    /// propagate and leave the current entry untouched.
    pub async fn refresh(&self, key: &CacheKey) -> DepotResult<Option<V>> {
        let Some(refresher) = self.subscription(key)? else {
            return Ok(None);
        };
        self.refresh_with(key, refresher.as_ref()).await.map(Some)
    }

    /// Store a value, stamping it as fetched now.
    pub fn set(&self, key: CacheKey, value: V) -> DepotResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DepotError::LockPoisoned)?;
        entries.insert(key, Entry::new(value));
        Ok(())
    }

    /// Register the refresher used when `key` goes stale. Replaces any
    /// previous subscription for the same key.
    pub fn subscribe(&self, key: CacheKey, refresher: Arc<dyn Refresher<V>>) -> DepotResult<()> {
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| DepotError::LockPoisoned)?;
        if subscriptions.insert(key.clone(), refresher).is_none() {
            cache_event!(self.config.verbose, key = %key, "Subscribed to refresh");
        }
        Ok(())
    }

    pub fn is_subscribed(&self, key: &CacheKey) -> DepotResult<bool> {
        Ok(self.subscription(key)?.is_some())
    }

    /// Drop the entry and subscription for `key`. Returns true if an entry
    /// was present.
    pub fn invalidate(&self, key: &CacheKey) -> DepotResult<bool> {
        let removed = self
            .entries
            .write()
            .map_err(|_| DepotError::LockPoisoned)?
            .remove(key)
            .is_some();
        self.subscriptions
            .write()
            .map_err(|_| DepotError::LockPoisoned)?
            .remove(key);
        self.refresh_locks
            .lock()
            .map_err(|_| DepotError::LockPoisoned)?
            .remove(key);
        Ok(removed)
    }

    /// Drop every entry and subscription.
    pub fn clear(&self) -> DepotResult<()> {
        self.entries
            .write()
            .map_err(|_| DepotError::LockPoisoned)?
            .clear();
        self.subscriptions
            .write()
            .map_err(|_| DepotError::LockPoisoned)?
            .clear();
        self.refresh_locks
            .lock()
            .map_err(|_| DepotError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Subscribed keys whose entries are stale or missing.
    pub fn stale_keys(&self) -> DepotResult<Vec<CacheKey>> {
        let now = Utc::now();
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| DepotError::LockPoisoned)?;
        let entries = self.entries.read().map_err(|_| DepotError::LockPoisoned)?;

        let mut keys: Vec<CacheKey> = subscriptions
            .keys()
            .filter(|key| {
                entries
                    .get(*key)
                    .map_or(true, |entry| entry.is_stale(self.config.refresh_interval, now))
            })
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Refresh every stale subscribed entry once.
    pub async fn sweep(&self) -> DepotResult<SweepReport> {
        let mut report = SweepReport::default();
        for key in self.stale_keys()? {
            let Some(refresher) = self.subscription(&key)? else {
                continue;
            };
            match self.refresh_with(&key, refresher.as_ref()).await {
                Ok(_) => report.refreshed += 1,
                Err(DepotError::LockPoisoned) => return Err(DepotError::LockPoisoned),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Background refresh failed");
                    report.failed += 1;
                }
            }
        }
        if report.refreshed + report.failed > 0 {
            cache_event!(
                self.config.verbose,
                refreshed = report.refreshed,
                failed = report.failed,
                "Cache sweep finished"
            );
        }
        Ok(report)
    }

    pub fn stats(&self) -> DepotResult<CacheStats> {
        let entry_count = self
            .entries
            .read()
            .map_err(|_| DepotError::LockPoisoned)?
            .len() as u64;
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| DepotError::LockPoisoned)?
            .len() as u64;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            entry_count,
            subscriptions,
        })
    }

    pub fn len(&self) -> DepotResult<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| DepotError::LockPoisoned)?
            .len())
    }

    pub fn is_empty(&self) -> DepotResult<bool> {
        Ok(self.len()? == 0)
    }

    fn refresh_lock(&self, key: &CacheKey) -> DepotResult<Arc<RefreshLock<()>>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .map_err(|_| DepotError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(key.clone()).or_default()))
    }

    fn entry(&self, key: &CacheKey) -> DepotResult<Option<Entry<V>>> {
        let entries = self.entries.read().map_err(|_| DepotError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn subscription(&self, key: &CacheKey) -> DepotResult<Option<Arc<dyn Refresher<V>>>> {
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| DepotError::LockPoisoned)?;
        Ok(subscriptions.get(key).cloned())
    }

    async fn refresh_with(&self, key: &CacheKey, refresher: &dyn Refresher<V>) -> DepotResult<V> {
        match refresher.refresh(key).await {
            Ok(value) => {
                self.set(key.clone(), value.clone())?;
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                cache_event!(self.config.verbose, key = %key, "Cache entry refreshed");
                Ok(value)
            }
            Err(e) => {
                self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

impl<V> std::fmt::Debug for ReadThroughCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
