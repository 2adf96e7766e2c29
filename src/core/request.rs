//! Per-request pipeline state.
//!
//! A `PipelineRequest` is owned by exactly one orchestrator invocation
//! and mutated in place as stages complete. Every temp file the request
//! ever touches is tracked so cleanup can remove it regardless of which
//! stage failed.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Outbound transport message-size limit, in characters.
pub const MAX_REPLY_CHARS: usize = 4000;

/// Transcript preview length for the audio path, in characters.
pub const PREVIEW_CHARS: usize = 500;

/// What the inbound message carried
#[derive(Debug, Clone)]
pub enum InboundPayload {
    Text(String),
    Audio { download_url: String },
}

/// One inbound message, already stripped of transport details
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user_id: i64,
    pub received_at: DateTime<Utc>,
    pub payload: InboundPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Audio,
    Text,
}

/// Pipeline stages, terminal on `Done` or `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Downloading,
    Normalizing,
    Recognizing,
    Summarizing,
    Delivering,
    Done,
    Failed,
}

/// Mutable state for one request
#[derive(Debug)]
pub struct PipelineRequest {
    /// Unique per inbound message: `<user>_<%Y%m%d_%H%M%S>`
    pub request_id: String,
    pub user_id: i64,
    pub received_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    pub raw_text: Option<String>,
    pub original_audio_path: Option<PathBuf>,
    pub normalized_audio_path: Option<PathBuf>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub stage: Stage,
    /// Every path handed to a stage, populated before the stage runs
    /// so partial writes are still cleaned up.
    temp_files: Vec<PathBuf>,
}

impl PipelineRequest {
    fn new(user_id: i64, received_at: DateTime<Utc>, source_kind: SourceKind) -> Self {
        Self {
            request_id: format!("{}_{}", user_id, received_at.format("%Y%m%d_%H%M%S")),
            user_id,
            received_at,
            source_kind,
            raw_text: None,
            original_audio_path: None,
            normalized_audio_path: None,
            transcript: None,
            summary: None,
            stage: Stage::Received,
            temp_files: Vec::new(),
        }
    }

    pub fn audio(user_id: i64, received_at: DateTime<Utc>) -> Self {
        Self::new(user_id, received_at, SourceKind::Audio)
    }

    pub fn text(user_id: i64, received_at: DateTime<Utc>, text: String) -> Self {
        let mut request = Self::new(user_id, received_at, SourceKind::Text);
        request.raw_text = Some(text);
        request
    }

    /// Register a temp path for unconditional cleanup.
    pub fn track_temp_file(&mut self, path: PathBuf) {
        self.temp_files.push(path);
    }

    /// The text to feed into summarization: the transcript on the audio
    /// path, the raw message on the text path.
    pub fn analysis_input(&self) -> Option<&str> {
        self.transcript.as_deref().or(self.raw_text.as_deref())
    }

    /// Delete every tracked temp file. Deletion errors are logged and
    /// never block completion.
    pub async fn cleanup(&mut self) {
        for path in self.temp_files.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove temp file");
                }
            }
        }
    }
}

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Splits on char boundaries; the concatenation of the chunks equals
/// the input.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// First `max_chars` characters of `text`, with an ellipsis marker when
/// truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let received_at = DateTime::parse_from_rfc3339("2024-06-01T12:34:56Z")
            .unwrap()
            .with_timezone(&Utc);
        let request = PipelineRequest::audio(12345, received_at);
        assert_eq!(request.request_id, "12345_20240601_123456");
        assert_eq!(request.stage, Stage::Received);
    }

    #[test]
    fn test_analysis_input_prefers_transcript() {
        let received_at = Utc::now();
        let mut request = PipelineRequest::text(1, received_at, "notes".to_string());
        assert_eq!(request.analysis_input(), Some("notes"));

        request.transcript = Some("spoken".to_string());
        assert_eq!(request.analysis_input(), Some("spoken"));
    }

    #[test]
    fn test_chunking_exact_multiples() {
        let text = "a".repeat(9000);
        let chunks = chunk_text(&text, MAX_REPLY_CHARS);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 4000);
        assert_eq!(chunks[1].chars().count(), 4000);
        assert_eq!(chunks[2].chars().count(), 1000);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunking_short_text_is_single_reply() {
        let chunks = chunk_text("короткое резюме", MAX_REPLY_CHARS);
        assert_eq!(chunks, vec!["короткое резюме".to_string()]);
    }

    #[test]
    fn test_chunking_multibyte_boundaries() {
        // Cyrillic chars are 2 bytes each; byte-based slicing would panic
        let text = "я".repeat(4001);
        let chunks = chunk_text(&text, MAX_REPLY_CHARS);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 4000);
        assert_eq!(chunks[1].chars().count(), 1);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_preview_truncation() {
        let long = "д".repeat(600);
        let short = "привет";

        let truncated = preview(&long, PREVIEW_CHARS);
        assert_eq!(truncated.chars().count(), PREVIEW_CHARS + 3);
        assert!(truncated.ends_with("..."));

        assert_eq!(preview(short, PREVIEW_CHARS), short);
    }

    #[tokio::test]
    async fn test_cleanup_removes_tracked_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let existing = temp.path().join("a.ogg");
        let never_created = temp.path().join("b.wav");
        tokio::fs::write(&existing, b"x").await.unwrap();

        let mut request = PipelineRequest::audio(1, Utc::now());
        request.track_temp_file(existing.clone());
        request.track_temp_file(never_created.clone());

        request.cleanup().await;

        assert!(!existing.exists());
        assert!(!never_created.exists());
    }
}
