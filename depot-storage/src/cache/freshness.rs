//! Staleness metadata for cache reads.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Where a cache read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// A fresh cached entry.
    Cache,
    /// The object store, just now.
    Store,
    /// A cached entry past its refresh interval whose refresh failed.
    Stale,
}

/// A cached value plus when and where it came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub fn hit(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            source: ReadSource::Cache,
        }
    }

    pub fn fetched(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            source: ReadSource::Store,
        }
    }

    pub fn stale(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            source: ReadSource::Stale,
        }
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn is_stale(&self) -> bool {
        self.source == ReadSource::Stale
    }

    /// Time since the value was read from the store; zero if the clock
    /// went backwards.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources() {
        assert_eq!(CacheRead::hit(1, Utc::now()).source(), ReadSource::Cache);
        assert_eq!(CacheRead::fetched(1).source(), ReadSource::Store);
        assert!(!CacheRead::fetched(1).is_stale());
        assert_eq!(CacheRead::fetched("body").into_value(), "body");
    }

    #[test]
    fn test_stale_read_reports_age() {
        let read = CacheRead::stale("old", Utc::now() - chrono::Duration::seconds(5));
        assert!(read.is_stale());
        assert!(read.age() >= Duration::from_secs(4));
        assert!(read.age() <= Duration::from_secs(10));
    }

    #[test]
    fn test_future_timestamp_has_zero_age() {
        let read = CacheRead::hit((), Utc::now() + chrono::Duration::seconds(60));
        assert_eq!(read.age(), Duration::ZERO);
    }
}
