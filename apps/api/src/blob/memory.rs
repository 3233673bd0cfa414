//! In-process blob store for tests. Creation times are assigned from the
//! wall clock unless a test seeds them explicitly.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{BlobError, BlobInfo, BlobStore, PutOptions};

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub body: Bytes,
    pub options: PutOptions,
    pub time_created: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_at(&self, name: &str, body: impl Into<Bytes>, time_created: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            name.to_string(),
            StoredBlob {
                body: body.into(),
                options: PutOptions::default(),
                time_created,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<StoredBlob> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, body: Bytes, options: PutOptions) -> Result<BlobInfo, BlobError> {
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(name) {
            return Err(BlobError::AlreadyExists(name.to_string()));
        }
        let time_created = Utc::now();
        objects.insert(
            name.to_string(),
            StoredBlob {
                body,
                options,
                time_created,
            },
        );
        Ok(BlobInfo {
            name: name.to_string(),
            time_created,
            public_url: self.public_url(name),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, BlobError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, blob)| BlobInfo {
                name: name.clone(),
                time_created: blob.time_created,
                public_url: self.public_url(name),
            })
            .collect())
    }

    async fn stat(&self, name: &str) -> Result<BlobInfo, BlobError> {
        self.get(name)
            .map(|blob| BlobInfo {
                name: name.to_string(),
                time_created: blob.time_created,
                public_url: self.public_url(name),
            })
            .ok_or_else(|| BlobError::NotFound(name.to_string()))
    }

    async fn download(&self, name: &str) -> Result<Bytes, BlobError> {
        self.get(name)
            .map(|blob| blob.body)
            .ok_or_else(|| BlobError::NotFound(name.to_string()))
    }

    fn public_url(&self, name: &str) -> String {
        format!("memory://bucket/{name}")
    }
}
