//! Stand-ins for the remote collaborators, shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::book::feed::FeedSource;
use crate::book::oai_pmh::BibliographicSource;
use crate::book::{BookIdentifier, FetchError, Metadata, MetadataValue};
use crate::llm_client::{LanguageModel, LlmError};
use crate::tts::{SpeechSynthesizer, TtsError};

pub struct StaticFeed {
    body: String,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl StaticFeed {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.body.clone())
    }
}

#[derive(Default)]
pub struct StaticBibliography {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl StaticBibliography {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with_oai_error(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BibliographicSource for StaticBibliography {
    async fn get_metadata(
        &self,
        _repository: &str,
        identifier: &BookIdentifier,
    ) -> Result<Metadata, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Oai {
                code: "idDoesNotExist".into(),
                message: identifier.to_string(),
            });
        }
        let mut metadata = Metadata::new();
        metadata.insert(
            "creator".into(),
            MetadataValue::List(vec!["Sato, Aiko".into()]),
        );
        metadata.insert("identifier".into(), MetadataValue::from(identifier.as_str()));
        Ok(metadata)
    }
}

#[derive(Default)]
pub struct ScriptedLlm {
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Good morning.\nToday's books are...".to_string())
    }
}

#[derive(Default)]
pub struct FakeTts {
    calls: AtomicUsize,
}

impl FakeTts {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, _text: &str) -> Result<Bytes, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"ID3fake-mp3"))
    }
}
