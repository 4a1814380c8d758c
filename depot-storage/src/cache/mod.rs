//! In-process read-through cache for object contents.
//!
//! Values are keyed by [`CacheKey`] (namespace plus path) and stamped with
//! the time they were fetched. Stale entries are refreshed through the
//! [`Refresher`] subscribed to their key, either lazily on the next read or
//! by the background sweeper.
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(CacheConfig::from(&config));
//! let key = CacheKey::s3_file("components/components.json");
//!
//! if let Some(read) = cache.get(&key).await? {
//!     if read.is_stale() {
//!         tracing::warn!(age = ?read.age(), "serving stale components list");
//!     }
//!     return Ok(read.into_value());
//! }
//! ```

pub mod freshness;
pub mod key;
pub mod read_through;
pub mod sweeper;
pub mod traits;

pub use freshness::{CacheRead, ReadSource};
pub use key::{CacheKey, S3_FILE_NAMESPACE};
pub use read_through::{CacheConfig, ReadThroughCache, SweepReport};
pub use sweeper::{spawn_sweeper, sweeper_task, SweeperMetrics, SweeperSnapshot};
pub use traits::{CacheStats, Refresher};
