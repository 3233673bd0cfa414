use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{WorkflowError, Workflows};
use crate::blob::artifacts::{self, ArtifactClass, DEFAULT_SUFFIX, KEYWORD_NAMESPACE, LATEST_ALL_NAMESPACE};
use crate::blob::put_once;
use crate::book::feed::parse_feed;
use crate::book::{urls, BookIdentifier, BookMap, Metadata, MstBook, ValidationError};
use crate::entity::radio_show::RadioShow;
use crate::keyword::{canonical, tokenize_keywords};
use crate::queue::Task;
use crate::timezone::to_display;

/// Items requested from the feed for the all-books show.
const LATEST_ALL_SIZE: usize = 100;
/// Items requested from the feed for a keyword show.
const KEYWORD_FEED_SIZE: usize = 100;
const SHOW_HOST: &str = "shelfcast";

impl Workflows {
    pub async fn latest_all(&self, broadcasted_at: Option<DateTime<Utc>>) -> Result<RadioShow, WorkflowError> {
        let url = urls::latest_all(&self.settings.feed_base_url, LATEST_ALL_SIZE)?;
        self.fetch_masterdata(&url, LATEST_ALL_NAMESPACE, DEFAULT_SUFFIX, broadcasted_at)
            .await
    }

    pub async fn latest_with_keywords_by_user(
        &self,
        user_id: &str,
        keyword_id: &str,
        broadcasted_at: Option<DateTime<Utc>>,
    ) -> Result<RadioShow, WorkflowError> {
        let keyword = self
            .keywords_of(user_id)
            .get_and_migrate(keyword_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("users/{user_id}/keywords/{keyword_id}")))?;

        let tokens = tokenize_keywords(&keyword.text);
        if tokens.is_empty() {
            return Err(ValidationError::EmptyKeywords.into());
        }
        debug!("Keyword {keyword_id} query: {}", canonical(&tokens));

        let url = urls::latest_with_keywords(&self.settings.feed_base_url, &tokens, KEYWORD_FEED_SIZE)?;
        self.fetch_masterdata(&url, KEYWORD_NAMESPACE, keyword_id, broadcasted_at)
            .await
    }

    /// Snapshots the feed, enriches every entry, stores the batch and creates
    /// the show that the script stage will pick up.
    pub async fn fetch_masterdata(
        &self,
        url: &str,
        namespace: &str,
        suffix: &str,
        broadcasted_at: Option<DateTime<Utc>>,
    ) -> Result<RadioShow, WorkflowError> {
        let now = Utc::now();
        let reference = broadcasted_at.unwrap_or(now);

        let snapshot = self.cache.fetch_rss(url, namespace, suffix, reference).await?;
        let feed = parse_feed(&snapshot.content)?;

        let mut books = BookMap::new();
        for entry in feed.entries {
            if entry.link.is_empty() {
                warn!("Skipping feed entry {} without a link", entry.id);
                continue;
            }

            let metadata = match BookIdentifier::from_pair(&entry.isbn, &entry.jp_e_code) {
                Ok(identifier) => self.cache.fetch_book_metadata(&identifier, now).await?,
                Err(e) => {
                    debug!("No bibliographic record for {}: {e}", entry.link);
                    Metadata::new()
                }
            };

            let code = if entry.isbn.is_empty() { &entry.jp_e_code } else { &entry.isbn };
            let book = MstBook {
                title: entry.title,
                summary: entry.summary,
                thumbnail_link: urls::thumbnail(code).unwrap_or_default(),
                isbn: entry.isbn,
                jp_e_code: entry.jp_e_code,
                link: entry.link.clone(),
                published: entry.published,
                metadata,
            };
            if books.insert(entry.link.clone(), book).is_some() {
                warn!("Duplicate feed entry for {}, keeping the later one", entry.link);
            }
        }

        let signature = artifacts::masterdata_signature(namespace, suffix, &snapshot.signature);
        let path = artifacts::masterdata_path(&signature)?;
        let ordered: BTreeMap<&String, &MstBook> = books.iter().collect();
        let body = Bytes::from(serde_json::to_vec(&ordered)?);
        put_once(
            self.blobs.as_ref(),
            &path,
            body,
            ArtifactClass::Masterdata.put_options(now),
        )
        .await?;
        info!("Masterdata {path} holds {} books", books.len());

        let id = Uuid::new_v4().to_string();
        let title = format!("New books for {}", to_display(&reference).format("%Y-%m-%d"));
        let show = self
            .radio_shows
            .create(RadioShow::creating(
                id,
                title,
                SHOW_HOST.to_string(),
                path,
                reference,
                now,
            ))
            .await?;

        self.queue
            .enqueue(&Task::RunAgentAndTts {
                radio_show_id: show.id.clone(),
            })
            .await?;
        info!("Radio show {} created, script stage enqueued", show.id);

        Ok(show)
    }
}
