use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info};

use super::{FetchError, ISBN_LEN, JP_E_CODE_LEN};
use crate::retry::RetryPolicy;

/// Plain HTTP GET returning the feed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpFeedSource {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFeedSource {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("Failed to build HTTP client"),
            retry,
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let client = &self.client;
        let body = self
            .retry
            .run("feed fetch", || async move {
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                        message: response.text().await.unwrap_or_default(),
                    });
                }
                Ok(response.text().await?)
            })
            .await?;
        info!("Fetched feed {url} ({} bytes)", body.len());
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub id: String,
    pub published: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub repository: String,
    pub isbn: String,
    pub jp_e_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    /// Feed-level `updated`, falling back to `published`.
    pub build_date: DateTime<Utc>,
    pub entries: Vec<FeedEntry>,
}

pub fn parse_feed(raw: &str) -> Result<ParsedFeed, FetchError> {
    let feed = feed_rs::parser::parse(raw.as_bytes()).map_err(|e| FetchError::Parse(e.to_string()))?;
    let build_date = feed
        .updated
        .or(feed.published)
        .ok_or(FetchError::MissingTimestamp)?;

    let entries: Vec<FeedEntry> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let (repository, isbn, jp_e_code) = split_identifier(&entry.id);
            FeedEntry {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                summary: entry.summary.map(|t| t.content).unwrap_or_default(),
                published: entry.published.or(entry.updated),
                tags: entry.categories.into_iter().map(|c| c.term).collect(),
                id: entry.id,
                repository,
                isbn,
                jp_e_code,
            }
        })
        .collect();

    debug!("Parsed feed built at {build_date} with {} entries", entries.len());
    Ok(ParsedFeed { build_date, entries })
}

/// Splits the last path segment of an entry id (`R100000137-I<sig>`) into
/// `(repository, isbn, jp_e_code)`. Unresolvable signatures leave both codes empty.
pub fn split_identifier(entry_id: &str) -> (String, String, String) {
    let segment = entry_id.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let Some((repository, signature)) = segment.split_once('-') else {
        return (String::new(), String::new(), String::new());
    };
    let signature = signature.strip_prefix('I').unwrap_or(signature);
    let (isbn, jp_e_code) = match signature.chars().count() {
        ISBN_LEN => (signature.to_string(), String::new()),
        JP_E_CODE_LEN => (String::new(), signature.to_string()),
        _ => (String::new(), String::new()),
    };
    (repository.to_string(), isbn, jp_e_code)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>NDL Search</title>
    <link>https://ndlsearch.ndl.go.jp/</link>
    <description>latest</description>
    <lastBuildDate>Sat, 08 Feb 2025 15:45:00 GMT</lastBuildDate>
    <item>
      <title>Rust in Practice</title>
      <link>https://ndlsearch.ndl.go.jp/books/R100000137-I9784000000002</link>
      <description>A practical book</description>
      <guid isPermaLink="true">https://ndlsearch.ndl.go.jp/books/R100000137-I9784000000002</guid>
      <category>Computers</category>
      <pubDate>Sun, 09 Feb 2025 01:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Digital Only</title>
      <link>https://ndlsearch.ndl.go.jp/books/R100000137-I12345678901234567890</link>
      <description>An e-book</description>
      <guid isPermaLink="true">https://ndlsearch.ndl.go.jp/books/R100000137-I12345678901234567890</guid>
      <pubDate>Mon, 10 Feb 2025 01:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Mystery Record</title>
      <link>https://ndlsearch.ndl.go.jp/books/R100000137-I000</link>
      <description>No usable code</description>
      <guid isPermaLink="true">https://ndlsearch.ndl.go.jp/books/R100000137-I000</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_split_identifier_by_length() {
        assert_eq!(
            split_identifier("https://ndlsearch.ndl.go.jp/books/R100000137-I9784000000002"),
            ("R100000137".into(), "9784000000002".into(), String::new())
        );
        assert_eq!(
            split_identifier("https://ndlsearch.ndl.go.jp/books/R100000137-I12345678901234567890"),
            ("R100000137".into(), String::new(), "12345678901234567890".into())
        );
        assert_eq!(
            split_identifier("https://ndlsearch.ndl.go.jp/books/R100000137-I000"),
            ("R100000137".into(), String::new(), String::new())
        );
        assert_eq!(split_identifier("no-slash-here").1, "");
    }

    #[test]
    fn test_parse_feed_uses_build_date_and_splits_codes() {
        let feed = parse_feed(SAMPLE_RSS).unwrap();
        assert_eq!(feed.build_date, Utc.with_ymd_and_hms(2025, 2, 8, 15, 45, 0).unwrap());
        assert_eq!(feed.entries.len(), 3);

        let first = &feed.entries[0];
        assert_eq!(first.title, "Rust in Practice");
        assert_eq!(first.isbn, "9784000000002");
        assert_eq!(first.tags, vec!["Computers".to_string()]);
        assert_eq!(
            first.published,
            Some(Utc.with_ymd_and_hms(2025, 2, 9, 1, 0, 0).unwrap())
        );
        assert_eq!(feed.entries[1].jp_e_code, "12345678901234567890");
        assert!(feed.entries[2].published.is_none());
    }

    #[test]
    fn test_parse_feed_without_timestamp_fails() {
        let raw = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
            <link>https://example.org</link><description>d</description></channel></rss>"#;
        assert!(matches!(parse_feed(raw), Err(FetchError::MissingTimestamp)));
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(matches!(parse_feed("not xml at all"), Err(FetchError::Parse(_))));
    }
}
