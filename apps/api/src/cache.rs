//! Cache-aware fetching. Remote feeds and bibliographic records are written
//! to blob storage once and reused while fresh:
//!
//! - RSS snapshots are fresh for the display-timezone day they fall in.
//! - Book records are fresh for `book_max_age_days` calendar days.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::blob::artifacts::{self, ArtifactClass};
use crate::blob::{newest, BlobError, BlobStore};
use crate::book::feed::{parse_feed, FeedSource};
use crate::book::oai_pmh::BibliographicSource;
use crate::book::{BookIdentifier, FetchError, Metadata};
use crate::timezone::{self, diff_days};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cached record {path} is not valid JSON: {source}")]
    CorruptRecord {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cached feed {0} is not valid UTF-8")]
    NotUtf8(String),

    #[error("could not encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An RSS document plus the signature it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct RssSnapshot {
    pub content: String,
    /// `YYYYMMDD_HHMMSS_0900` of the feed's build date.
    pub signature: String,
    pub blob_name: String,
    pub from_cache: bool,
}

pub struct CacheWorkflow {
    blobs: Arc<dyn BlobStore>,
    feeds: Arc<dyn FeedSource>,
    bibliography: Arc<dyn BibliographicSource>,
    repository: String,
    book_max_age_days: i64,
}

impl CacheWorkflow {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        feeds: Arc<dyn FeedSource>,
        bibliography: Arc<dyn BibliographicSource>,
        repository: String,
        book_max_age_days: i64,
    ) -> Self {
        Self {
            blobs,
            feeds,
            bibliography,
            repository,
            book_max_age_days,
        }
    }

    /// Returns the newest snapshot already stored for the reference instant's
    /// display day, or fetches the feed and stores it under its build date.
    pub async fn fetch_rss(
        &self,
        url: &str,
        namespace: &str,
        suffix: &str,
        reference: DateTime<Utc>,
    ) -> Result<RssSnapshot, CacheError> {
        let prefix = artifacts::rss_day_prefix(namespace, suffix, &reference)?;

        let cached = newest(self.blobs.list(&prefix).await?);
        if let Some(blob) = cached {
            let body = self.blobs.download(&blob.name).await?;
            let content =
                String::from_utf8(body.to_vec()).map_err(|_| CacheError::NotUtf8(blob.name.clone()))?;
            info!("RSS cache hit: {}", blob.name);
            return Ok(RssSnapshot {
                content,
                signature: artifacts::stem(&blob.name).to_string(),
                blob_name: blob.name,
                from_cache: true,
            });
        }

        info!("RSS cache miss under {prefix}, fetching {url}");
        let content = self.feeds.fetch(url).await?;
        let build_date = parse_feed(&content)?.build_date;
        let blob_name = artifacts::rss_path(namespace, suffix, &build_date)?;

        match self
            .blobs
            .put(
                &blob_name,
                Bytes::from(content.clone()),
                ArtifactClass::RssSnapshot.put_options(Utc::now()),
            )
            .await
        {
            Ok(_) => info!("Cached RSS snapshot {blob_name}"),
            Err(BlobError::AlreadyExists(_)) => debug!("RSS snapshot {blob_name} already stored"),
            Err(e) => return Err(e.into()),
        }

        Ok(RssSnapshot {
            content,
            signature: timezone::signature(&build_date),
            blob_name,
            from_cache: false,
        })
    }

    /// Returns the newest cached record if it is at most `book_max_age_days`
    /// calendar days older than `reference`, or fetches it from the
    /// bibliographic service and stores it.
    pub async fn fetch_book_metadata(
        &self,
        identifier: &BookIdentifier,
        reference: DateTime<Utc>,
    ) -> Result<Metadata, CacheError> {
        let prefix = artifacts::book_record_prefix(identifier);

        if let Some(blob) = newest(self.blobs.list(&prefix).await?) {
            let age = diff_days(reference, blob.time_created);
            if age <= self.book_max_age_days {
                let body = self.blobs.download(&blob.name).await?;
                let metadata = serde_json::from_slice(&body).map_err(|source| CacheError::CorruptRecord {
                    path: blob.name.clone(),
                    source,
                })?;
                debug!("Book record cache hit: {} ({age} days old)", blob.name);
                return Ok(metadata);
            }
            info!("Book record {} is {age} days old, refetching", blob.name);
        }

        let metadata = self
            .bibliography
            .get_metadata(&self.repository, identifier)
            .await?;
        let body = Bytes::from(serde_json::to_vec(&metadata)?);
        let options = ArtifactClass::BookRecord.put_options(reference);

        let path = artifacts::book_record_path(identifier);
        match self.blobs.put(&path, body.clone(), options.clone()).await {
            Ok(_) => info!("Cached book record {path}"),
            Err(BlobError::AlreadyExists(_)) => {
                let refreshed = artifacts::refreshed_book_record_path(identifier, &reference);
                match self.blobs.put(&refreshed, body, options).await {
                    Ok(_) => info!("Cached book record {refreshed}"),
                    Err(BlobError::AlreadyExists(_)) => {
                        debug!("Book record {refreshed} already stored this second")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }

        Ok(metadata)
    }
}
