use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::retry::{RetryPolicy, Transient};

const TTS_API_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const LANGUAGE_CODE: &str = "ja-JP";
const VOICE_NAME: &str = "ja-JP-Neural2-B";
const SPEAKING_RATE: f64 = 1.1;
const EFFECTS_PROFILE: &str = "handset-class-device";

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("TTS returned no audio")]
    EmptyAudio,
}

impl Transient for TtsError {
    fn is_transient(&self) -> bool {
        match self {
            TtsError::Http(_) => true,
            TtsError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Text to MP3 audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, TtsError>;
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: Option<String>,
}

/// Google Cloud Text-to-Speech REST client.
#[derive(Clone)]
pub struct GoogleTts {
    client: Client,
    api_key: String,
    retry: RetryPolicy,
}

impl GoogleTts {
    pub fn new(api_key: String, retry: RetryPolicy) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            retry,
        }
    }
}

/// Replaces newlines and tabs with spaces before synthesis.
pub fn prepare_text(text: &str) -> String {
    text.replace(['\n', '\t'], " ")
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Bytes, TtsError> {
        let body = json!({
            "input": { "text": prepare_text(text) },
            "voice": { "languageCode": LANGUAGE_CODE, "name": VOICE_NAME },
            "audioConfig": {
                "audioEncoding": "MP3",
                "effectsProfileId": [EFFECTS_PROFILE],
                "pitch": 0.0,
                "speakingRate": SPEAKING_RATE,
                "volumeGainDb": 0.0,
            },
        });

        let client = &self.client;
        let api_key = self.api_key.as_str();
        let body = &body;
        let response: SynthesizeResponse = self
            .retry
            .run("tts synthesize", || async move {
                let response = client
                    .post(TTS_API_URL)
                    .header("x-goog-api-key", api_key)
                    .json(body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(TtsError::Api {
                        status: status.as_u16(),
                        message: response.text().await.unwrap_or_default(),
                    });
                }
                Ok(response.json().await?)
            })
            .await?;

        let audio = decode_audio(response.audio_content.as_deref())?;
        info!("Synthesized {} bytes of audio", audio.len());
        Ok(audio)
    }
}

fn decode_audio(encoded: Option<&str>) -> Result<Bytes, TtsError> {
    let encoded = encoded.filter(|s| !s.is_empty()).ok_or(TtsError::EmptyAudio)?;
    let audio = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    debug!("Decoded {} audio bytes", audio.len());
    Ok(Bytes::from(audio))
}
