//! Adapter interfaces for external systems.
//!
//! Adapters wrap the remote services the pipeline depends on: the
//! Telegram Bot API for message transport, SaluteSpeech for speech
//! recognition, and a Mistral-style chat-completion API for meeting
//! analysis. The orchestrator only sees the traits defined here.

pub mod mistral;
pub mod salute;
pub mod telegram;
pub mod token;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub use mistral::{SummarizationClient, FALLBACK_MESSAGE};
pub use salute::TranscriptionClient;
pub use telegram::{ChatSink, TelegramClient};
pub use token::{AccessToken, AuthError, OAuthExchanger, TokenCache, TokenExchanger};

/// Outcome of a recognition attempt.
///
/// Recognition never surfaces an error to the caller: any transport
/// failure, provider rejection, or unsupported format collapses to
/// `Unavailable` (the cause is logged where it happens). An empty
/// provider result is also `Unavailable`; a `Text` transcript is
/// always non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Text(String),
    Unavailable,
}

impl Recognition {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Unavailable => None,
        }
    }
}

/// Outcome of a summarization attempt.
///
/// Summarization failure degrades to a fixed localized fallback rather
/// than aborting the request; the user always gets a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    Summary(String),
    Fallback(String),
}

impl Analysis {
    /// The text to deliver, whichever way the analysis went.
    pub fn into_text(self) -> String {
        match self {
            Self::Summary(text) | Self::Fallback(text) => text,
        }
    }
}

/// Speech-to-text over a normalized audio file
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn recognize(&self, audio_path: &Path) -> Recognition;
}

/// Meeting analysis over a transcript or raw text
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn summarize(&self, text: &str) -> Analysis;
}

/// Formatting hint for outbound replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Plain,
    Markdown,
}

/// Ordered outbound replies for one conversation
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, text: &str, format: ReplyFormat) -> Result<()>;
}
