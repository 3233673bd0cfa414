//! Object storage for cached feeds, book records, masterdata and show media.
//! Objects are write-once: a name that already exists is never overwritten.

pub mod artifacts;
#[cfg(test)]
pub mod memory;
pub mod s3;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob {0} already exists")]
    AlreadyExists(String),

    #[error("blob {0} not found")]
    NotFound(String),

    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("S3 error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub name: String,
    pub time_created: DateTime<Utc>,
    pub public_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub metadata: HashMap<String, String>,
    pub public_read: bool,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes a new object. Fails with [`BlobError::AlreadyExists`] if `name` is taken.
    async fn put(&self, name: &str, body: Bytes, options: PutOptions) -> Result<BlobInfo, BlobError>;

    /// Every object whose name starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, BlobError>;

    /// Info for an existing object, with the creation time the backend recorded.
    async fn stat(&self, name: &str) -> Result<BlobInfo, BlobError>;

    async fn download(&self, name: &str) -> Result<Bytes, BlobError>;

    fn public_url(&self, name: &str) -> String;
}

/// The most recently created blob, if any.
pub fn newest(blobs: Vec<BlobInfo>) -> Option<BlobInfo> {
    blobs.into_iter().max_by_key(|b| b.time_created)
}

/// Writes `body` under `name`, or returns the existing object's info when the
/// name is already taken.
pub async fn put_once(
    store: &dyn BlobStore,
    name: &str,
    body: Bytes,
    options: PutOptions,
) -> Result<BlobInfo, BlobError> {
    match store.put(name, body, options).await {
        Err(BlobError::AlreadyExists(_)) => {
            tracing::info!("Blob {name} already exists, reusing it");
            store.stat(name).await
        }
        other => other,
    }
}
