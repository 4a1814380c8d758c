//! Registry storage adapter.
//!
//! [`StorageAdapter`] is what the registry talks to: cached file and JSON
//! reads, public URLs, directory listings, uploads and recursive deletion,
//! all over an [`ObjectStoreClient`]. Every store call is bounded by the
//! configured request timeout.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{
    child_name, component_url, get_file_info, next_year, normalize_dir, upload_key, DepotConfig,
    DepotError, DepotResult, StoreError, DELIMITER,
};
use futures_util::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::backend::ObjectStoreBackend;
use crate::cache::{
    spawn_sweeper, CacheConfig, CacheKey, CacheStats, ReadThroughCache, Refresher, SweeperMetrics,
};
use crate::client::{ObjectAcl, ObjectStoreClient, PutObjectRequest};

/// Relative path of the one file `put_dir` uploads privately.
const PRIVATE_ENTRYPOINT: &str = "/server.js";

/// Bound a store call by `timeout`.
async fn with_timeout<T, F>(
    operation: &'static str,
    key: &str,
    timeout: Duration,
    call: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation,
            key: key.to_string(),
            timeout,
        }),
    }
}

/// Downloads object contents. Also serves as the refresh subscription for
/// every cached path.
struct FileFetcher {
    client: Arc<dyn ObjectStoreClient>,
    timeout: Duration,
}

impl FileFetcher {
    async fn fetch(&self, path: &str) -> DepotResult<String> {
        let body = with_timeout(
            "get_object",
            path,
            self.timeout,
            self.client.get_object(path),
        )
        .await
        .map_err(|e| match e {
            StoreError::NoSuchKey { .. } => DepotError::FileNotFound {
                path: path.to_string(),
            },
            other => DepotError::Store(other),
        })?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl Refresher<String> for FileFetcher {
    async fn refresh(&self, key: &CacheKey) -> DepotResult<String> {
        self.fetch(key.path()).await
    }
}

/// Storage adapter for the component registry.
pub struct StorageAdapter {
    client: Arc<dyn ObjectStoreClient>,
    fetcher: Arc<FileFetcher>,
    cache: Arc<ReadThroughCache<String>>,
    base_path: String,
    components_dir: String,
    timeout: Duration,
    max_concurrent_requests: usize,
}

impl StorageAdapter {
    /// Create an adapter over `client`, taking timeouts, cache settings and
    /// paths from `config`.
    pub fn new(client: Arc<dyn ObjectStoreClient>, config: &DepotConfig) -> Self {
        let timeout = config.s3.timeout();
        Self {
            fetcher: Arc::new(FileFetcher {
                client: Arc::clone(&client),
                timeout,
            }),
            client,
            cache: Arc::new(ReadThroughCache::new(CacheConfig::from(config))),
            base_path: config.s3.path.clone(),
            components_dir: config.s3.components_dir.clone(),
            timeout,
            max_concurrent_requests: config.max_concurrent_requests.max(1),
        }
    }

    /// Create an adapter backed by S3.
    pub fn from_config(config: &DepotConfig) -> DepotResult<Self> {
        let backend = ObjectStoreBackend::from_config(&config.s3)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    /// Replace the cache with an empty one using `config`.
    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = Arc::new(ReadThroughCache::new(config));
        self
    }

    pub fn client(&self) -> &Arc<dyn ObjectStoreClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<ReadThroughCache<String>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> DepotResult<CacheStats> {
        self.cache.stats()
    }

    pub fn components_dir(&self) -> &str {
        &self.components_dir
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Fetch the contents of `path` as text.
    ///
    /// With `force` the store is always hit and the cache is neither read
    /// nor written. Otherwise a cached copy is served while fresh; on a miss
    /// the contents are fetched, cached and subscribed for refresh.
    pub async fn get_file(&self, path: &str, force: bool) -> DepotResult<String> {
        if force {
            return self.fetcher.fetch(path).await;
        }

        let key = CacheKey::s3_file(path);
        if let Some(read) = self.cache.get(&key).await? {
            return Ok(read.into_value());
        }

        let content = self.fetcher.fetch(path).await?;
        self.cache.set(key.clone(), content.clone())?;
        let refresher: Arc<dyn Refresher<String>> = self.fetcher.clone();
        self.cache.subscribe(key, refresher)?;
        Ok(content)
    }

    /// Fetch `path` and parse it as JSON.
    pub async fn get_json(&self, path: &str, force: bool) -> DepotResult<serde_json::Value> {
        self.get_json_as(path, force).await
    }

    /// Fetch `path` and deserialize it into `T`.
    pub async fn get_json_as<T: DeserializeOwned>(&self, path: &str, force: bool) -> DepotResult<T> {
        let content = self.get_file(path, force).await?;
        serde_json::from_str(&content).map_err(|_| DepotError::FileNotValid {
            path: path.to_string(),
        })
    }

    /// Public URL of a component file.
    pub fn get_url(&self, component_name: &str, version: &str, file_name: &str) -> String {
        component_url(&self.base_path, component_name, version, file_name)
    }

    /// Names of the immediate subdirectories of `dir`.
    pub async fn list_sub_directories(&self, dir: &str) -> DepotResult<Vec<String>> {
        let prefix = normalize_dir(dir);
        let listing = with_timeout(
            "list_objects",
            &prefix,
            self.timeout,
            self.client.list_objects(&prefix, DELIMITER),
        )
        .await?;

        let names: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|common| child_name(&prefix, common))
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(DepotError::DirNotFound {
                dir: dir.to_string(),
            });
        }
        Ok(names)
    }

    /// Upload `content` to `key`.
    ///
    /// Content type and gzip encoding come from the key's extension. Objects
    /// expire one year from now.
    pub async fn put_file_content(
        &self,
        content: impl Into<Bytes>,
        key: &str,
        is_private: bool,
    ) -> DepotResult<()> {
        let info = get_file_info(key);
        let mut request = PutObjectRequest::new(key, content, ObjectAcl::from_private(is_private));
        request.content_type = info.mime_type.map(str::to_string);
        if info.gzip {
            request.content_encoding = Some("gzip".to_string());
        }
        request.expires = Some(next_year());

        with_timeout("put_object", key, self.timeout, self.client.put_object(request)).await?;
        tracing::debug!(key = %key, private = is_private, "Uploaded object");
        Ok(())
    }

    /// Upload the local file at `local_path` to `key`.
    pub async fn put_file(
        &self,
        local_path: impl AsRef<Path>,
        key: &str,
        is_private: bool,
    ) -> DepotResult<()> {
        let local_path = local_path.as_ref();
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| DepotError::Io {
                path: local_path.display().to_string(),
                reason: e.to_string(),
            })?;
        self.put_file_content(content, key, is_private).await
    }

    /// Upload every file under `dir_input` to `dir_output`, preserving
    /// relative paths. Returns the number of files uploaded.
    ///
    /// Uploads run concurrently up to `max_concurrent_requests`. All of them
    /// are attempted; any failures are reported together.
    pub async fn put_dir(&self, dir_input: impl AsRef<Path>, dir_output: &str) -> DepotResult<usize> {
        let root = dir_input.as_ref().to_path_buf();
        let display = root.display().to_string();
        let files = tokio::task::spawn_blocking(move || collect_files(&root))
            .await
            .map_err(|e| DepotError::Io {
                path: display,
                reason: e.to_string(),
            })??;

        let total = files.len();
        let failures: Vec<DepotError> = stream::iter(files)
            .map(|(local_path, relative)| async move {
                let key = upload_key(dir_output, &relative);
                let is_private = relative == PRIVATE_ENTRYPOINT;
                self.put_file(&local_path, &key, is_private).await
            })
            .buffer_unordered(self.max_concurrent_requests)
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;

        if !failures.is_empty() {
            tracing::error!(
                dir_output = %dir_output,
                failed = failures.len(),
                total,
                "Directory upload failed"
            );
            return Err(DepotError::Upload { failures });
        }

        tracing::info!(dir_output = %dir_output, files = total, "Uploaded directory");
        Ok(total)
    }

    /// Delete every object under `dir`. Returns the number deleted.
    ///
    /// Keys are listed a page at a time and each page is removed with one
    /// batched delete, following the continuation token until the listing
    /// is exhausted.
    pub async fn delete_directory(&self, dir: &str) -> DepotResult<usize> {
        let mut continuation_token: Option<String> = None;
        let mut deleted = 0;

        loop {
            let page = with_timeout(
                "list_objects_v2",
                dir,
                self.timeout,
                self.client
                    .list_objects_v2(dir, continuation_token.as_deref()),
            )
            .await?;

            tracing::info!(
                dir = %dir,
                keys = page.keys.len(),
                truncated = page.is_truncated,
                "Listed objects for deletion"
            );

            if !page.keys.is_empty() {
                let output = with_timeout(
                    "delete_objects",
                    dir,
                    self.timeout,
                    self.client.delete_objects(&page.keys),
                )
                .await?;
                deleted += output.deleted.len();
                tracing::info!(dir = %dir, deleted = output.deleted.len(), "Deleted objects");
            }

            match (page.is_truncated, page.next_continuation_token) {
                (true, Some(token)) => continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(deleted)
    }

    /// Drop the cached copy and subscription for `path`.
    pub fn invalidate(&self, path: &str) -> DepotResult<bool> {
        self.cache.invalidate(&CacheKey::s3_file(path))
    }

    /// Refresh stale cached files in the background every `period` until
    /// `shutdown_rx` turns true.
    pub fn spawn_sweeper(
        &self,
        period: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<Arc<SweeperMetrics>> {
        spawn_sweeper(Arc::clone(&self.cache), period, shutdown_rx)
    }
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("bucket", &self.client.bucket())
            .field("base_path", &self.base_path)
            .field("components_dir", &self.components_dir)
            .field("timeout", &self.timeout)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish_non_exhaustive()
    }
}

/// Every regular file under `root`, paired with its path relative to `root`
/// in `/`-separated form with a leading `/`.
fn collect_files(root: &Path) -> DepotResult<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| DepotError::Io {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DepotError::Io {
                path: entry.path().display().to_string(),
                reason: e.to_string(),
            })?;
        let relative = format!("/{}", relative.to_string_lossy()).replace('\\', "/");
        files.push((entry.into_path(), relative));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}
