//! DEPOT Storage - object storage adapter for the component registry
//!
//! [`StorageAdapter`] serves registry files from an S3-compatible bucket
//! through an in-process [`ReadThroughCache`], lists component directories,
//! uploads packaged components and deletes them again. [`UpdateLog`] keeps
//! the append-only `update.log` document.
//!
//! The store itself sits behind the [`ObjectStoreClient`] trait;
//! [`ObjectStoreBackend`] implements it over `object_store`.

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod client;
pub mod telemetry;
pub mod update_log;

pub use adapter::StorageAdapter;
pub use backend::{ObjectStoreBackend, DEFAULT_PAGE_SIZE, SERVER_SIDE_ENCRYPTION};
pub use cache::{
    spawn_sweeper, CacheConfig, CacheKey, CacheRead, CacheStats, ReadSource, ReadThroughCache,
    Refresher, SweepReport, SweeperMetrics, SweeperSnapshot, S3_FILE_NAMESPACE,
};
pub use client::{
    DeleteObjectsOutput, ListObjectsOutput, ListPage, ObjectAcl, ObjectStoreClient,
    PutObjectRequest,
};
pub use telemetry::{init_tracing, TelemetryConfig};
pub use update_log::UpdateLog;
