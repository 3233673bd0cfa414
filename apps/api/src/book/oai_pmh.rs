use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::{BookIdentifier, FetchError, Metadata, MetadataValue, ValidationError};
use crate::retry::RetryPolicy;

pub const METADATA_PREFIX: &str = "dcndl";
const IDENTIFIER_NAMESPACE: &str = "oai:ndlsearch.ndl.go.jp";

/// Bibliographic metadata lookup by `(repository, identifier)`.
#[async_trait]
pub trait BibliographicSource: Send + Sync {
    async fn get_metadata(
        &self,
        repository: &str,
        identifier: &BookIdentifier,
    ) -> Result<Metadata, FetchError>;
}

pub fn oai_identifier(repository: &str, identifier: &BookIdentifier) -> String {
    format!("{IDENTIFIER_NAMESPACE}:{repository}-I{}", identifier.as_str())
}

/// OAI-PMH `GetRecord` client.
#[derive(Clone)]
pub struct OaiPmhClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl OaiPmhClient {
    pub fn new(base_url: String, retry: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            retry,
        }
    }

    pub fn record_url(&self, repository: &str, identifier: &BookIdentifier) -> Result<Url, ValidationError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("verb", "GetRecord")
            .append_pair("metadataPrefix", METADATA_PREFIX)
            .append_pair("identifier", &oai_identifier(repository, identifier));
        Ok(url)
    }
}

#[async_trait]
impl BibliographicSource for OaiPmhClient {
    async fn get_metadata(
        &self,
        repository: &str,
        identifier: &BookIdentifier,
    ) -> Result<Metadata, FetchError> {
        let url = self.record_url(repository, identifier)?;
        let client = &self.client;
        let url = &url;
        let body = self
            .retry
            .run("oai-pmh GetRecord", || async move {
                let response = client.get(url.clone()).send().await?;
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

        let metadata = parse_record(&body)?;
        debug!("Fetched {} metadata fields for {identifier}", metadata.len());
        Ok(metadata)
    }
}

/// Builds the metadata map from a `GetRecord` response: every element below
/// `<metadata>` maps its local name to the text values found, in document order.
pub fn parse_record(xml: &str) -> Result<Metadata, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut depth = 0usize;
    let mut stack: Vec<String> = Vec::new();
    let mut error: Option<(String, String)> = None;
    let mut in_error = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if depth > 0 {
                    depth += 1;
                    stack.push(name);
                } else if name == "metadata" {
                    depth = 1;
                } else if name == "error" {
                    let code = e
                        .try_get_attribute("code")
                        .ok()
                        .flatten()
                        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
                        .unwrap_or_default();
                    error = Some((code, String::new()));
                    in_error = true;
                }
            }
            Ok(Event::End(_)) => {
                if depth > 1 {
                    stack.pop();
                }
                depth = depth.saturating_sub(1);
                in_error = false;
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if depth == 0 && name == "error" {
                    error = Some((String::new(), String::new()));
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| FetchError::Parse(e.to_string()))?;
                push_text(&mut fields, &stack, depth, in_error, &mut error, &text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                push_text(&mut fields, &stack, depth, in_error, &mut error, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::Parse(e.to_string())),
            _ => {}
        }
    }

    if let Some((code, message)) = error {
        warn!("OAI-PMH error response {code}: {message}");
        return Err(FetchError::Oai { code, message });
    }

    Ok(fields
        .into_iter()
        .map(|(name, values)| {
            let values = values.into_iter().map(MetadataValue::Text).collect();
            (name, MetadataValue::List(values))
        })
        .collect())
}

fn push_text(
    fields: &mut BTreeMap<String, Vec<String>>,
    stack: &[String],
    depth: usize,
    in_error: bool,
    error: &mut Option<(String, String)>,
    text: &str,
) {
    if in_error {
        if let Some((_, message)) = error.as_mut() {
            message.push_str(text);
        }
    } else if depth > 1 {
        if let Some(name) = stack.last() {
            fields.entry(name.clone()).or_default().push(text.to_string());
        }
    }
}
