//! `object_store`-backed implementation of [`ObjectStoreClient`].
//!
//! Production uses `AmazonS3` built from [`S3Config`]; tests use
//! `object_store::memory::InMemory` through the same code path.
//!
//! # ACLs
//!
//! `object_store` has no per-request canned ACL, so the S3 backend holds two
//! handles that differ only in their default `x-amz-acl` header. Uploads pick
//! the handle matching the request's [`ObjectAcl`]; reads, listings and
//! deletes go through the public handle.
//!
//! # Keys and prefixes
//!
//! Keys are stored verbatim. `object_store` paths cannot hold empty or
//! relative segments, so keys with a leading, trailing or doubled `/` are
//! rejected with [`StoreError::InvalidKey`] instead of being rewritten.
//! Prefixes match as plain strings, as S3 does: `components/fo` covers both
//! `components/foo/...` and `components/foobar/...`. Listings start from the
//! deepest whole directory in the prefix and filter the rest.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use depot_core::{invalid_key_reason, S3Config, StoreError, DELIMITER};
use futures_util::stream::{self, StreamExt};
use http::{HeaderMap, HeaderValue};
use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
};

use crate::client::{
    DeleteObjectsOutput, ListObjectsOutput, ListPage, ObjectAcl, ObjectStoreClient,
    PutObjectRequest,
};

/// Keys returned per `list_objects_v2` page (S3's own maximum).
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Server-side encryption requested on every upload.
pub const SERVER_SIDE_ENCRYPTION: &str = "AES256";

const SERVER_SIDE_ENCRYPTION_KEY: &str = "aws_server_side_encryption";

/// Object store client over any `object_store` backend.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    bucket: String,
    public: Arc<dyn ObjectStore>,
    private: Arc<dyn ObjectStore>,
    page_size: usize,
}

impl ObjectStoreBackend {
    /// Wrap a single store used for every ACL.
    pub fn new(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.into(),
            public: Arc::clone(&store),
            private: store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Wrap one store per ACL.
    pub fn with_acl_stores(
        bucket: impl Into<String>,
        public: Arc<dyn ObjectStore>,
        private: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            public,
            private,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// In-memory backend, for tests and local development.
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(bucket, Arc::new(InMemory::new()))
    }

    /// Set the number of keys returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Build the S3 backend from configuration.
    pub fn from_config(config: &S3Config) -> Result<Self, StoreError> {
        let public = build_s3(config, ObjectAcl::PublicRead)?;
        let private = build_s3(config, ObjectAcl::AuthenticatedRead)?;
        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            proxied = config.agent_proxy.is_some(),
            "Object store client configured"
        );
        Ok(Self::with_acl_stores(config.bucket.clone(), public, private))
    }

    fn store_for(&self, acl: ObjectAcl) -> &Arc<dyn ObjectStore> {
        match acl {
            ObjectAcl::PublicRead => &self.public,
            ObjectAcl::AuthenticatedRead => &self.private,
        }
    }
}

/// Client options shared by both ACL handles.
fn build_client_options(config: &S3Config, acl: ObjectAcl) -> ClientOptions {
    let mut headers = HeaderMap::new();
    headers.insert("x-amz-acl", HeaderValue::from_static(acl.as_str()));

    let mut options = ClientOptions::new()
        .with_timeout(config.timeout())
        .with_default_headers(headers);

    if let Some(proxy) = &config.agent_proxy {
        options = options.with_proxy_url(proxy);
    }
    if config
        .endpoint
        .as_deref()
        .is_some_and(|endpoint| endpoint.starts_with("http://"))
    {
        options = options.with_allow_http(true);
    }
    options
}

fn parse_config_key(name: &str) -> Result<AmazonS3ConfigKey, StoreError> {
    name.parse().map_err(|e: object_store::Error| StoreError::InvalidConfig {
        reason: format!("unknown override {}: {}", name, e),
    })
}

fn s3_builder(config: &S3Config, acl: ObjectAcl) -> Result<AmazonS3Builder, StoreError> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_region(&config.region)
        .with_client_options(build_client_options(config, acl));

    if let (Some(key), Some(secret)) = (&config.key, &config.secret) {
        builder = builder
            .with_access_key_id(key)
            .with_secret_access_key(secret);
    }

    if let Some(endpoint) = &config.endpoint {
        // Path-style requests for MinIO and friends
        builder = builder
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(false);
    }

    builder = builder.with_config(
        parse_config_key(SERVER_SIDE_ENCRYPTION_KEY)?,
        SERVER_SIDE_ENCRYPTION,
    );

    // Overrides go last so they win over everything above.
    for (name, value) in &config.overrides {
        builder = builder.with_config(parse_config_key(name)?, value);
    }
    Ok(builder)
}

fn build_s3(config: &S3Config, acl: ObjectAcl) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store = s3_builder(config, acl)?.build().map_err(|e| StoreError::InvalidConfig {
        reason: format!("S3: {}", e),
    })?;
    Ok(Arc::new(store))
}

/// Path for a key, refusing keys `object_store` would rewrite.
fn object_path(key: &str) -> Result<ObjectPath, StoreError> {
    if let Some(reason) = invalid_key_reason(key) {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        });
    }
    ObjectPath::parse(key).map_err(|e| StoreError::InvalidKey {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Where to start listing for a string prefix.
///
/// `Ok(None)` lists from the bucket root. `Err(())` means no storable key can
/// start with `prefix`, because its directory part is not a valid key.
fn listing_root(prefix: &str) -> Result<Option<ObjectPath>, ()> {
    let dir = match prefix.rfind(DELIMITER) {
        Some(0) | None => return Ok(None),
        Some(end) => &prefix[..end],
    };
    object_path(dir).map(Some).map_err(|_| ())
}

fn map_store_error(operation: &'static str, key: &str, err: object_store::Error) -> StoreError {
    match err {
        object_store::Error::NotFound { .. } => StoreError::NoSuchKey {
            key: key.to_string(),
        },
        other => StoreError::Request {
            operation,
            key: key.to_string(),
            reason: other.to_string(),
        },
    }
}

fn put_attributes(request: &PutObjectRequest) -> Attributes {
    let mut attributes = Attributes::new();
    if let Some(content_type) = &request.content_type {
        attributes.insert(Attribute::ContentType, content_type.clone().into());
    }
    if let Some(content_encoding) = &request.content_encoding {
        attributes.insert(Attribute::ContentEncoding, content_encoding.clone().into());
    }
    if let Some(expires) = request.expires {
        let max_age = (expires - Utc::now()).num_seconds().max(0);
        attributes.insert(
            Attribute::CacheControl,
            format!("max-age={}", max_age).into(),
        );
    }
    attributes
}

#[async_trait]
impl ObjectStoreClient for ObjectStoreBackend {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        let location = object_path(key)?;
        let result = self
            .public
            .get(&location)
            .await
            .map_err(|e| map_store_error("get_object", key, e))?;
        result
            .bytes()
            .await
            .map_err(|e| map_store_error("get_object", key, e))
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StoreError> {
        let location = object_path(&request.key)?;
        let options = PutOptions {
            attributes: put_attributes(&request),
            ..Default::default()
        };
        self.store_for(request.acl)
            .put_opts(&location, PutPayload::from(request.body.clone()), options)
            .await
            .map_err(|e| map_store_error("put_object", &request.key, e))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: char,
    ) -> Result<ListObjectsOutput, StoreError> {
        if delimiter != DELIMITER {
            return Err(StoreError::Request {
                operation: "list_objects",
                key: prefix.to_string(),
                reason: format!("unsupported delimiter {:?}", delimiter),
            });
        }

        let Ok(root) = listing_root(prefix) else {
            return Ok(ListObjectsOutput::default());
        };
        let listing = self
            .public
            .list_with_delimiter(root.as_ref())
            .await
            .map_err(|e| map_store_error("list_objects", prefix, e))?;

        Ok(ListObjectsOutput {
            common_prefixes: listing
                .common_prefixes
                .into_iter()
                .map(|p| format!("{}{}", p, DELIMITER))
                .filter(|p| p.starts_with(prefix))
                .collect(),
        })
    }

    async fn list_objects_v2(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let Ok(root) = listing_root(prefix) else {
            return Ok(ListPage::default());
        };
        let mut listing = match continuation_token {
            Some(token) => {
                let offset = object_path(token)?;
                self.public.list_with_offset(root.as_ref(), &offset)
            }
            None => self.public.list(root.as_ref()),
        };

        let mut keys = Vec::new();
        let mut is_truncated = false;
        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(|e| map_store_error("list_objects_v2", prefix, e))?;
            let key = meta.location.to_string();
            if !key.starts_with(prefix) {
                continue;
            }
            if keys.len() == self.page_size {
                is_truncated = true;
                break;
            }
            keys.push(key);
        }

        let next_continuation_token = if is_truncated {
            keys.last().cloned()
        } else {
            None
        };
        Ok(ListPage {
            keys,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsOutput, StoreError> {
        let locations = keys
            .iter()
            .map(|k| object_path(k))
            .collect::<Result<Vec<_>, _>>()?;
        let mut results = self
            .public
            .delete_stream(stream::iter(locations.into_iter().map(Ok)).boxed());

        let mut deleted = Vec::with_capacity(keys.len());
        while let Some(result) = results.next().await {
            let location = result.map_err(|e| map_store_error("delete_objects", &self.bucket, e))?;
            deleted.push(location.to_string());
        }
        Ok(DeleteObjectsOutput { deleted })
    }
}
