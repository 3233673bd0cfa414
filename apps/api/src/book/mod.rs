//! Book records as assembled from the NDL Search feed and OAI-PMH service.

pub mod classify;
pub mod feed;
pub mod oai_pmh;
pub mod prompt;
pub mod urls;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Transient;

pub const ISBN_LEN: usize = 13;
pub const JP_E_CODE_LEN: usize = 20;

/// Caller errors, rejected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} is empty")]
    EmptyIdentifier { kind: IdentifierKind },

    #[error("{kind} must be {expected} characters, got {actual}")]
    WrongLength {
        kind: IdentifierKind,
        expected: usize,
        actual: usize,
    },

    #[error("either isbn or jp_e_code must be supplied")]
    MissingIdentifier,

    #[error("isbn and jp_e_code are mutually exclusive")]
    ConflictingIdentifiers,

    #[error("target_datetime must be in JST timezone (got {found})")]
    WrongTimezone { found: String },

    #[error("no keywords to search for")]
    EmptyKeywords,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Failures talking to the feed or bibliographic service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("feed has neither an updated nor a published timestamp")]
    MissingTimestamp,

    #[error("OAI-PMH error {code}: {message}")]
    Oai { code: String, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Isbn,
    JpECode,
}

impl IdentifierKind {
    pub fn expected_len(self) -> usize {
        match self {
            IdentifierKind::Isbn => ISBN_LEN,
            IdentifierKind::JpECode => JP_E_CODE_LEN,
        }
    }

    /// Directory under which this kind's records are cached.
    pub fn dir_name(self) -> &'static str {
        match self {
            IdentifierKind::Isbn => "isbn",
            IdentifierKind::JpECode => "jp_e_code",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A validated ISBN-13 or JP-e code. Hyphens are stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookIdentifier {
    kind: IdentifierKind,
    value: String,
}

impl BookIdentifier {
    pub fn new(kind: IdentifierKind, raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim().replace('-', "");
        if value.is_empty() {
            return Err(ValidationError::EmptyIdentifier { kind });
        }
        let actual = value.chars().count();
        if actual != kind.expected_len() {
            return Err(ValidationError::WrongLength {
                kind,
                expected: kind.expected_len(),
                actual,
            });
        }
        Ok(Self { kind, value })
    }

    pub fn isbn(raw: &str) -> Result<Self, ValidationError> {
        Self::new(IdentifierKind::Isbn, raw)
    }

    pub fn jp_e_code(raw: &str) -> Result<Self, ValidationError> {
        Self::new(IdentifierKind::JpECode, raw)
    }

    /// Exactly one of the two must be non-empty.
    pub fn from_pair(isbn: &str, jp_e_code: &str) -> Result<Self, ValidationError> {
        match (isbn.is_empty(), jp_e_code.is_empty()) {
            (false, true) => Self::isbn(isbn),
            (true, false) => Self::jp_e_code(jp_e_code),
            (true, true) => Err(ValidationError::MissingIdentifier),
            (false, false) => Err(ValidationError::ConflictingIdentifiers),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for BookIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Open-ended bibliographic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Null => Ok(()),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Number(n) => write!(f, "{n}"),
            MetadataValue::Text(s) => f.write_str(s),
            MetadataValue::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            MetadataValue::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// An enriched book, keyed by `link` within one masterdata batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MstBook {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub jp_e_code: String,
    pub link: String,
    #[serde(default)]
    pub thumbnail_link: String,
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MstBook {
    pub fn identifier(&self) -> Option<BookIdentifier> {
        BookIdentifier::from_pair(&self.isbn, &self.jp_e_code).ok()
    }
}

pub type BookMap = HashMap<String, MstBook>;
