//! DEPOT Test Utilities
//!
//! Shared test infrastructure for the DEPOT workspace:
//! - An in-memory [`MockObjectStore`] with call counters, failure injection
//!   and artificial latency
//! - Proptest generators for registry paths and log lines
//! - Test fixtures for configs and adapters
//! - Custom assertions for DEPOT error codes

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

// Re-export core types for convenience
pub use depot_core::{
    invalid_key_reason, DepotConfig, DepotError, DepotResult, S3Config, StoreError, DIR_NOT_FOUND_CODE,
    FILE_NOT_FOUND_CODE, FILE_NOT_VALID_CODE,
};
pub use depot_storage::{
    DeleteObjectsOutput, ListObjectsOutput, ListPage, ObjectAcl, ObjectStoreClient,
    PutObjectRequest, StorageAdapter,
};

// ============================================================================
// MOCK OBJECT STORE
// ============================================================================

/// An object held by [`MockObjectStore`], with the metadata it was put with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub acl: ObjectAcl,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

impl StoredObject {
    pub fn public(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            acl: ObjectAcl::PublicRead,
            content_type: None,
            content_encoding: None,
            expires: None,
        }
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Store operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Get,
    Put,
    List,
    ListV2,
    Delete,
}

/// In-memory object store client for tests.
///
/// Keys are kept sorted, so listings come back in lexicographic order.
/// Prefixes match as plain strings, and keys the production backend cannot
/// store (empty or relative segments) are refused the same way. Every
/// call yields to the scheduler once between reading state and returning,
/// which lets `tokio::join!` interleave concurrent calls the way a real
/// network round-trip would.
#[derive(Debug)]
pub struct MockObjectStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failures: Mutex<HashMap<MockOperation, StoreError>>,
    latency: Duration,
    page_size: usize,
    gets: AtomicUsize,
    puts: AtomicUsize,
    lists: AtomicUsize,
    list_pages: AtomicUsize,
    deletes: AtomicUsize,
    delete_batches: Mutex<Vec<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            page_size: 1000,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            list_pages: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            delete_batches: Mutex::new(Vec::new()),
        }
    }

    /// Keys returned per `list_objects_v2` page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Insert a public object without counting a put.
    ///
    /// Panics on keys [`ObjectStoreClient::put_object`] would refuse.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>) {
        self.insert_object(key, StoredObject::public(body));
    }

    pub fn insert_object(&self, key: impl Into<String>, object: StoredObject) {
        let key = key.into();
        if let Some(reason) = invalid_key_reason(&key) {
            panic!("cannot seed key {:?}: {}", key, reason);
        }
        lock(&self.objects).insert(key, object);
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        lock(&self.objects).get(key).cloned()
    }

    /// Body of `key` as text.
    pub fn text(&self, key: &str) -> Option<String> {
        self.object(key).map(|o| o.text())
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every call to `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: MockOperation, error: StoreError) {
        lock(&self.failures).insert(operation, error);
    }

    pub fn clear_failure(&self, operation: MockOperation) {
        lock(&self.failures).remove(&operation);
    }

    pub fn calls(&self, operation: MockOperation) -> usize {
        let counter = match operation {
            MockOperation::Get => &self.gets,
            MockOperation::Put => &self.puts,
            MockOperation::List => &self.lists,
            MockOperation::ListV2 => &self.list_pages,
            MockOperation::Delete => &self.deletes,
        };
        counter.load(Ordering::SeqCst)
    }

    /// Size of each `delete_objects` batch, in call order.
    pub fn delete_batches(&self) -> Vec<usize> {
        lock(&self.delete_batches).clone()
    }

    fn check_key(key: &str) -> Result<(), StoreError> {
        match invalid_key_reason(key) {
            Some(reason) => Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn begin(&self, operation: MockOperation) -> Result<(), StoreError> {
        let counter = match operation {
            MockOperation::Get => &self.gets,
            MockOperation::Put => &self.puts,
            MockOperation::List => &self.lists,
            MockOperation::ListV2 => &self.list_pages,
            MockOperation::Delete => &self.deletes,
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match lock(&self.failures).get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStoreClient for MockObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        self.begin(MockOperation::Get).await?;
        Self::check_key(key)?;
        let body = lock(&self.objects).get(key).map(|o| o.body.clone());
        tokio::task::yield_now().await;
        body.ok_or_else(|| StoreError::NoSuchKey {
            key: key.to_string(),
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StoreError> {
        self.begin(MockOperation::Put).await?;
        Self::check_key(&request.key)?;
        tokio::task::yield_now().await;
        let object = StoredObject {
            body: request.body,
            acl: request.acl,
            content_type: request.content_type,
            content_encoding: request.content_encoding,
            expires: request.expires,
        };
        lock(&self.objects).insert(request.key, object);
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: char,
    ) -> Result<ListObjectsOutput, StoreError> {
        self.begin(MockOperation::List).await?;
        let common_prefixes: BTreeSet<String> = lock(&self.objects)
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(prefix)?;
                let end = rest.find(delimiter)?;
                Some(format!("{}{}", prefix, &rest[..=end]))
            })
            .collect();
        tokio::task::yield_now().await;
        Ok(ListObjectsOutput {
            common_prefixes: common_prefixes.into_iter().collect(),
        })
    }

    async fn list_objects_v2(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        self.begin(MockOperation::ListV2).await?;
        let mut matching: Vec<String> = lock(&self.objects)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| continuation_token.map_or(true, |token| key.as_str() > token))
            .cloned()
            .collect();
        tokio::task::yield_now().await;

        let is_truncated = matching.len() > self.page_size;
        matching.truncate(self.page_size);
        let next_continuation_token = if is_truncated {
            matching.last().cloned()
        } else {
            None
        };
        Ok(ListPage {
            keys: matching,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsOutput, StoreError> {
        self.begin(MockOperation::Delete).await?;
        lock(&self.delete_batches).push(keys.len());
        let mut objects = lock(&self.objects);
        let deleted = keys
            .iter()
            .filter(|key| objects.remove(key.as_str()).is_some())
            .cloned()
            .collect();
        Ok(DeleteObjectsOutput { deleted })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for registry paths and content.

    use proptest::prelude::*;

    /// Component names: lowercase, starting with a letter.
    pub fn arb_component_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,20}"
    }

    /// Semver-shaped versions.
    pub fn arb_version() -> impl Strategy<Value = String> {
        (0u32..20, 0u32..50, 0u32..100)
            .prop_map(|(major, minor, patch)| format!("{}.{}.{}", major, minor, patch))
    }

    /// File extensions a component package typically contains.
    pub fn arb_extension() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just(".js"),
            Just(".css"),
            Just(".html"),
            Just(".json"),
            Just(".png"),
            Just(".svg"),
            Just(".woff2"),
            Just(".map"),
        ]
    }

    /// File names with a known extension and optional `.br`/`.gz` suffixes.
    pub fn arb_file_name() -> impl Strategy<Value = String> {
        (
            "[a-z][a-z0-9_]{0,12}",
            arb_extension(),
            prop_oneof![Just(""), Just(".gz"), Just(".br"), Just(".br.gz")],
        )
            .prop_map(|(stem, ext, compression)| format!("{}{}{}", stem, ext, compression))
    }

    /// Full object keys: `components/{name}/{version}/{file}`.
    pub fn arb_object_key() -> impl Strategy<Value = String> {
        (arb_component_name(), arb_version(), arb_file_name()).prop_map(
            |(name, version, file)| format!("components/{}/{}/{}", name, version, file),
        )
    }

    /// Single-line printable log messages.
    pub fn arb_log_message() -> impl Strategy<Value = String> {
        "[ -~]{1,80}"
    }

    /// Distinct component names, for directory listings.
    pub fn arb_component_names(max: usize) -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set(arb_component_name(), 1..=max.max(1))
            .prop_map(|names| names.into_iter().collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built configs and adapters for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    pub const TEST_BUCKET: &str = "registry-test";
    pub const TEST_BASE_URL: &str = "https://cdn.example.com/components/";
    pub const TEST_COMPONENTS_DIR: &str = "components";

    /// A valid S3 config without credentials.
    pub fn test_s3_config() -> S3Config {
        S3Config {
            bucket: TEST_BUCKET.to_string(),
            region: "us-east-1".to_string(),
            key: None,
            secret: None,
            path: TEST_BASE_URL.to_string(),
            components_dir: TEST_COMPONENTS_DIR.to_string(),
            timeout_ms: 1_000,
            agent_proxy: None,
            endpoint: None,
            overrides: BTreeMap::new(),
        }
    }

    /// A valid config with default cache settings.
    pub fn test_config() -> DepotConfig {
        DepotConfig {
            s3: test_s3_config(),
            refresh_interval_ms: 60_000,
            max_concurrent_requests: 4,
            verbosity: false,
        }
    }

    /// An adapter over a fresh mock store.
    pub fn mock_adapter() -> (Arc<MockObjectStore>, StorageAdapter) {
        mock_adapter_with(MockObjectStore::new(TEST_BUCKET), &test_config())
    }

    /// An adapter over `store` configured by `config`.
    pub fn mock_adapter_with(
        store: MockObjectStore,
        config: &DepotConfig,
    ) -> (Arc<MockObjectStore>, StorageAdapter) {
        let store = Arc::new(store);
        let adapter = StorageAdapter::new(store.clone(), config);
        (store, adapter)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on DEPOT error codes and messages.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &DepotResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert a FILE_NOT_FOUND error naming `path`.
    #[track_caller]
    pub fn assert_file_not_found<T: std::fmt::Debug>(result: &DepotResult<T>, path: &str) {
        match result {
            Err(DepotError::FileNotFound { path: p }) => {
                assert_eq!(p, path, "Wrong path in FileNotFound error");
            }
            other => panic!("Expected FileNotFound, got: {:?}", other),
        }
        if let Err(e) = result {
            assert_eq!(e.code(), FILE_NOT_FOUND_CODE);
            assert!(e.msg().contains(path));
        }
    }

    /// Assert a FILE_NOT_VALID error naming `path`.
    #[track_caller]
    pub fn assert_file_not_valid<T: std::fmt::Debug>(result: &DepotResult<T>, path: &str) {
        match result {
            Err(DepotError::FileNotValid { path: p }) => {
                assert_eq!(p, path, "Wrong path in FileNotValid error");
            }
            other => panic!("Expected FileNotValid, got: {:?}", other),
        }
        if let Err(e) = result {
            assert_eq!(e.code(), FILE_NOT_VALID_CODE);
        }
    }

    /// Assert a DIR_NOT_FOUND error naming `dir`.
    #[track_caller]
    pub fn assert_dir_not_found<T: std::fmt::Debug>(result: &DepotResult<T>, dir: &str) {
        match result {
            Err(DepotError::DirNotFound { dir: d }) => {
                assert_eq!(d, dir, "Wrong dir in DirNotFound error");
            }
            other => panic!("Expected DirNotFound, got: {:?}", other),
        }
        if let Err(e) = result {
            assert_eq!(e.code(), DIR_NOT_FOUND_CODE);
        }
    }

    /// Assert a transport error, which the adapter passes through unchanged.
    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(result: &DepotResult<T>) {
        match result {
            Err(DepotError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
