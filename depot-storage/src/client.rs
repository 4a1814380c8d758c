//! Object store client trait for asynchronous bucket operations.
//!
//! This is the only surface the adapter needs from an S3-compatible store.
//! Implementations are bound to a single bucket at construction time.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use depot_core::StoreError;

/// Canned ACL applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectAcl {
    /// Readable by anyone.
    PublicRead,
    /// Readable by authenticated principals only.
    AuthenticatedRead,
}

impl ObjectAcl {
    pub fn from_private(is_private: bool) -> Self {
        if is_private {
            Self::AuthenticatedRead
        } else {
            Self::PublicRead
        }
    }

    /// Header value understood by S3 (`x-amz-acl`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicRead => "public-read",
            Self::AuthenticatedRead => "authenticated-read",
        }
    }
}

/// A single object upload.
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub key: String,
    pub body: Bytes,
    pub acl: ObjectAcl,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

impl PutObjectRequest {
    pub fn new(key: impl Into<String>, body: impl Into<Bytes>, acl: ObjectAcl) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            acl,
            content_type: None,
            content_encoding: None,
            expires: None,
        }
    }
}

/// Result of a delimited listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsOutput {
    /// Full common-prefix strings, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
}

/// One page of a flat (non-delimited) listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// More keys match the prefix beyond this page.
    pub is_truncated: bool,
    /// Token to pass back to fetch the next page.
    pub next_continuation_token: Option<String>,
}

/// Result of a batched delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectsOutput {
    pub deleted: Vec<String>,
}

/// Object store client for bucket operations.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Bucket this client operates on.
    fn bucket(&self) -> &str;

    /// Download an object. Missing keys yield [`StoreError::NoSuchKey`].
    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Upload an object, replacing any existing one.
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), StoreError>;

    /// List the common prefixes directly under `prefix`, grouped by `delimiter`.
    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: char,
    ) -> Result<ListObjectsOutput, StoreError>;

    /// List one page of keys under `prefix`, resuming after `continuation_token`.
    async fn list_objects_v2(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    /// Delete a batch of keys.
    async fn delete_objects(&self, keys: &[String]) -> Result<DeleteObjectsOutput, StoreError>;
}
