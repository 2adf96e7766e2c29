//! SaluteSpeech recognition client.
//!
//! Sends raw audio bytes to the REST recognition endpoint. The content
//! type is chosen from the file extension; anything the provider does
//! not accept short-circuits without touching the network. Failures
//! never propagate as errors: the orchestrator treats
//! `Recognition::Unavailable` as "recognition unavailable" and tells
//! the user to try again.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::token::TokenCache;
use super::{Recognition, Transcriber};

/// Content type accepted by the provider for a given file extension.
///
/// Opus-in-Ogg is accepted natively; WAV/PCM must already be 16 kHz
/// mono s16 (the normalizer's output profile).
fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "ogg" => Some("audio/ogg;codecs=opus"),
        "wav" | "pcm" => Some("audio/x-pcm;bit=16;rate=16000"),
        "mp3" => Some("audio/mpeg"),
        _ => None,
    }
}

/// Wire format of the recognition response
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    result: Option<String>,
}

/// SaluteSpeech REST recognition client
pub struct TranscriptionClient {
    client: reqwest::Client,
    recognize_url: String,
    tokens: Arc<TokenCache>,
}

impl TranscriptionClient {
    pub fn new(recognize_url: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            client: reqwest::Client::new(),
            recognize_url: recognize_url.into(),
            tokens,
        }
    }

    async fn recognize_inner(&self, audio_path: &Path, content_type: &str) -> Result<String> {
        let token = self
            .tokens
            .get_valid_token()
            .await
            .context("failed to obtain access token")?;

        let audio_data = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("failed to read audio file {}", audio_path.display()))?;

        let response = self
            .client
            .post(&self.recognize_url)
            .header("Content-Type", content_type)
            .header("Authorization", format!("Bearer {}", token.token))
            .header("X-Request-ID", Uuid::new_v4().to_string())
            .body(audio_data)
            .send()
            .await
            .context("recognition request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("recognition endpoint returned {}", status);
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .context("failed to parse recognition response")?;

        body.result
            .context("recognition response missing 'result' field")
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn recognize(&self, audio_path: &Path) -> Recognition {
        // Reject unsupported formats before spending a token on them
        let Some(content_type) = content_type_for(audio_path) else {
            error!(path = %audio_path.display(), "unsupported audio format");
            return Recognition::Unavailable;
        };

        match self.recognize_inner(audio_path, content_type).await {
            Ok(text) if !text.is_empty() => {
                info!(chars = text.chars().count(), "speech recognized");
                Recognition::Text(text)
            }
            Ok(_) => {
                error!("provider returned an empty transcript");
                Recognition::Unavailable
            }
            Err(e) => {
                error!(error = %e, "speech recognition failed");
                Recognition::Unavailable
            }
        }
    }
}
