//! protokol - Telegram meeting assistant
//!
//! Turns a voice note or text message with a meeting recording into a
//! structured summary:
//!
//! 1. The audio attachment is downloaded and normalized (Opus-in-Ogg
//!    passes through; other containers are transcoded to 16 kHz mono
//!    s16 PCM via ffmpeg).
//! 2. SaluteSpeech transcribes the normalized audio, with a cached
//!    OAuth token shared across concurrent requests.
//! 3. A Mistral-style chat-completion model produces a structured
//!    summary (attendees, topics, decisions, action items, next steps).
//! 4. The summary is delivered back in ordered chunks within the
//!    transport's message-size limit, followed by a transcript preview.
//!
//! # Modules
//!
//! - `adapters`: External service integrations (Telegram, SaluteSpeech,
//!   Mistral) and the traits the orchestrator depends on
//! - `core`: Pipeline orchestration and per-request state
//! - `ingest`: Audio download and format normalization
//! - `config`: Layered configuration (env > file > defaults)
//! - `cli`: Command-line interface

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use adapters::{
    AccessToken, Analysis, Analyzer, AuthError, Recognition, ReplyFormat, ReplySink,
    SummarizationClient, TelegramClient, TokenCache, TokenExchanger, Transcriber,
};
pub use core::{InboundMessage, InboundPayload, Orchestrator, PipelineRequest, SourceKind, Stage};
pub use ingest::{AudioIngestion, AudioSource, DownloadError, NormalizeError};
