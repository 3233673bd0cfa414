//! Storage layout for every artifact the pipeline writes.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{BlobError, PutOptions};
use crate::book::BookIdentifier;
use crate::timezone;

pub const RSS_DIR: &str = "private/rss";
pub const BOOK_RECORD_DIR: &str = "private/oai_pmh";
pub const MASTERDATA_DIR: &str = "private/masterdata";
pub const AUDIO_DIR: &str = "public/radio_show_audio";
pub const SCRIPT_DIR: &str = "public/radio_show_script";

pub const DEFAULT_SUFFIX: &str = "non";
pub const LATEST_ALL_NAMESPACE: &str = "latest_all";
pub const KEYWORD_NAMESPACE: &str = "keyword";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactClass {
    RssSnapshot,
    BookRecord,
    Masterdata,
    Audio,
    Script,
}

impl ArtifactClass {
    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactClass::RssSnapshot => "application/xml",
            ArtifactClass::BookRecord | ArtifactClass::Masterdata => "application/json",
            ArtifactClass::Audio => "audio/mpeg",
            ArtifactClass::Script => "text/plain; charset=utf-8",
        }
    }

    pub fn max_age_secs(self) -> u64 {
        match self {
            ArtifactClass::RssSnapshot | ArtifactClass::BookRecord | ArtifactClass::Masterdata => 300,
            ArtifactClass::Audio | ArtifactClass::Script => 604_800,
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, ArtifactClass::Audio | ArtifactClass::Script)
    }

    pub fn put_options(self, written_at: DateTime<Utc>) -> PutOptions {
        PutOptions {
            content_type: self.content_type().to_string(),
            cache_control: Some(format!("public, max-age={}", self.max_age_secs())),
            metadata: [(
                "custom_time".to_string(),
                written_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            )]
            .into_iter()
            .collect(),
            public_read: self.is_public(),
        }
    }
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str, BlobError> {
    if value.trim().is_empty() || value.contains('/') {
        return Err(BlobError::InvalidPath(format!("{what} {value:?} is not a valid path segment")));
    }
    Ok(value)
}

pub fn rss_dir(namespace: &str, suffix: &str) -> Result<String, BlobError> {
    Ok(format!(
        "{RSS_DIR}/{}_{}",
        non_empty("namespace", namespace)?,
        non_empty("suffix", suffix)?
    ))
}

/// `private/rss/{namespace}_{suffix}/{YYYYMMDD_HHMMSS_0900}.xml`
pub fn rss_path(namespace: &str, suffix: &str, build_date: &DateTime<Utc>) -> Result<String, BlobError> {
    Ok(format!(
        "{}/{}.xml",
        rss_dir(namespace, suffix)?,
        timezone::signature(build_date)
    ))
}

/// Prefix matching every RSS snapshot of the reference instant's display day.
pub fn rss_day_prefix(namespace: &str, suffix: &str, reference: &DateTime<Utc>) -> Result<String, BlobError> {
    Ok(format!(
        "{}/{}",
        rss_dir(namespace, suffix)?,
        timezone::day_prefix(reference)
    ))
}

/// Prefix matching every cached record of one book.
pub fn book_record_prefix(identifier: &BookIdentifier) -> String {
    format!(
        "{BOOK_RECORD_DIR}/{}/{}",
        identifier.kind().dir_name(),
        identifier.as_str()
    )
}

/// `private/oai_pmh/{isbn|jp_e_code}/{identifier}.json`
pub fn book_record_path(identifier: &BookIdentifier) -> String {
    format!("{}.json", book_record_prefix(identifier))
}

/// Name used when a stale record is refreshed; the original name is never overwritten.
pub fn refreshed_book_record_path(identifier: &BookIdentifier, fetched_at: &DateTime<Utc>) -> String {
    format!(
        "{}_{}.json",
        book_record_prefix(identifier),
        timezone::signature(fetched_at)
    )
}

pub fn masterdata_signature(namespace: &str, suffix: &str, snapshot_signature: &str) -> String {
    format!("{namespace}_{suffix}_{snapshot_signature}")
}

pub fn masterdata_path(signature: &str) -> Result<String, BlobError> {
    Ok(format!("{MASTERDATA_DIR}/{}.json", non_empty("signature", signature)?))
}

pub fn audio_path(signature: &str) -> Result<String, BlobError> {
    Ok(format!("{AUDIO_DIR}/{}.mp3", non_empty("signature", signature)?))
}

pub fn script_path(signature: &str) -> Result<String, BlobError> {
    Ok(format!("{SCRIPT_DIR}/{}.txt", non_empty("signature", signature)?))
}

/// File stem of a blob name: `a/b/c.json` -> `c`.
pub fn stem(name: &str) -> &str {
    let file = name.rsplit('/').next().unwrap_or(name);
    file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file)
}
