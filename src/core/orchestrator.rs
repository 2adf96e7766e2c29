//! End-to-end pipeline driver for one inbound message.
//!
//! Stages run strictly sequentially: download → normalize → recognize →
//! summarize → deliver (the text path starts at summarize). The first
//! failed stage sends its own user-facing message; anything unexpected
//! collapses to a single generic reply. Temp files are removed
//! unconditionally, whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::adapters::{Analyzer, Recognition, ReplyFormat, ReplySink, Transcriber};
use crate::ingest::{AudioContainer, AudioSource, DownloadError, NormalizeError};

use super::request::{
    chunk_text, preview, InboundMessage, InboundPayload, PipelineRequest, SourceKind, Stage,
    MAX_REPLY_CHARS, PREVIEW_CHARS,
};

const ACK_AUDIO: &str = "🎤 Обрабатываю ваше аудио сообщение...";
const ACK_TEXT: &str = "📝 Обрабатываю ваш текст...";
const PROGRESS_RECOGNIZING: &str = "🔍 Распознаю речь...";
const PROGRESS_ANALYZING: &str = "🤖 Анализирую содержание...";

const SUMMARY_HEADER: &str = "📋 **Анализ встречи**";
const TRANSCRIPT_HEADER: &str = "📝 **Распознанный текст (фрагмент):**";

const MSG_DOWNLOAD_FAILED: &str = "❌ Ошибка при загрузке аудио.";
const MSG_NORMALIZE_FAILED: &str = "❌ Не удалось обработать аудио файл.";
const MSG_RECOGNITION_FAILED: &str = "❌ Не удалось распознать речь. Попробуйте ещё раз.";
const MSG_GENERIC_ERROR: &str = "⚠️ Произошла ошибка при обработке. Попробуйте ещё раз.";

/// A stage failure that terminates the pipeline
#[derive(Debug, Error)]
pub enum StageError {
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("speech recognition unavailable")]
    Recognition,

    #[error("delivery failed: {0}")]
    Delivery(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl StageError {
    /// User-facing text for this failure.
    fn user_message(&self) -> &'static str {
        match self {
            Self::Download(_) => MSG_DOWNLOAD_FAILED,
            Self::Normalize(_) => MSG_NORMALIZE_FAILED,
            Self::Recognition => MSG_RECOGNITION_FAILED,
            Self::Delivery(_) | Self::Internal(_) => MSG_GENERIC_ERROR,
        }
    }
}

/// Drives the full pipeline for each inbound message
pub struct Orchestrator {
    audio: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn Analyzer>,
    temp_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        audio: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn Analyzer>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            audio,
            transcriber,
            analyzer,
            temp_dir,
        }
    }

    /// Handle one inbound message end to end.
    ///
    /// Always terminates with exactly one of: successful delivery, a
    /// stage-specific failure message, or the generic error message.
    #[instrument(skip(self, message, sink), fields(user_id = message.user_id))]
    pub async fn handle_message(&self, message: InboundMessage, sink: &dyn ReplySink) {
        let mut request = match &message.payload {
            InboundPayload::Audio { .. } => {
                PipelineRequest::audio(message.user_id, message.received_at)
            }
            InboundPayload::Text(text) => {
                PipelineRequest::text(message.user_id, message.received_at, text.clone())
            }
        };

        info!(request_id = %request.request_id, "pipeline started");

        let outcome = self.execute(&mut request, &message, sink).await;

        // Cleanup runs whatever happened above
        request.cleanup().await;

        match outcome {
            Ok(()) => {
                request.stage = Stage::Done;
                info!(request_id = %request.request_id, "pipeline completed");
            }
            Err(e) => {
                request.stage = Stage::Failed;
                error!(request_id = %request.request_id, error = %e, "pipeline failed");
                if let Err(reply_err) = sink.reply(e.user_message(), ReplyFormat::Plain).await {
                    error!(error = %reply_err, "failed to deliver failure notice");
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &mut PipelineRequest,
        message: &InboundMessage,
        sink: &dyn ReplySink,
    ) -> Result<(), StageError> {
        // Receipt acknowledgement; best effort, like all progress notices
        let ack = match request.source_kind {
            SourceKind::Audio => ACK_AUDIO,
            SourceKind::Text => ACK_TEXT,
        };
        self.notify(sink, ack).await;

        if let InboundPayload::Audio { download_url } = &message.payload {
            let normalized = self.ingest_audio(request, download_url).await?;

            request.stage = Stage::Recognizing;
            self.notify(sink, PROGRESS_RECOGNIZING).await;

            match self.transcriber.recognize(&normalized).await {
                Recognition::Text(text) => request.transcript = Some(text),
                Recognition::Unavailable => return Err(StageError::Recognition),
            }
        }

        request.stage = Stage::Summarizing;
        self.notify(sink, PROGRESS_ANALYZING).await;

        let input = request
            .analysis_input()
            .ok_or_else(|| StageError::Internal(anyhow::anyhow!("request has no analysis input")))?
            .to_string();
        let analysis = self.analyzer.summarize(&input).await;
        request.summary = Some(analysis.into_text());

        self.deliver(request, sink).await
    }

    /// Download and normalization stages of the audio path. Returns
    /// the normalized file ready for recognition.
    async fn ingest_audio(
        &self,
        request: &mut PipelineRequest,
        download_url: &str,
    ) -> Result<PathBuf, StageError> {
        request.stage = Stage::Downloading;

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| StageError::Internal(e.into()))?;

        // Voice notes arrive as Opus-in-Ogg; the extension drives both
        // normalization and the recognition content type.
        let original = self
            .temp_dir
            .join(format!("{}_original.ogg", request.request_id));
        // Tracked before the write so a partial download is still removed
        request.track_temp_file(original.clone());
        self.audio.fetch(download_url, &original).await?;
        request.original_audio_path = Some(original.clone());

        request.stage = Stage::Normalizing;

        let ext = AudioContainer::classify(&original).normalized_extension(&original);
        let normalized = self
            .temp_dir
            .join(format!("{}_normalized.{}", request.request_id, ext));
        request.track_temp_file(normalized.clone());
        self.audio.normalize(&original, &normalized).await?;
        request.normalized_audio_path = Some(normalized.clone());

        Ok(normalized)
    }

    /// Chunked delivery of the summary, plus the transcript preview on
    /// the audio path.
    async fn deliver(
        &self,
        request: &mut PipelineRequest,
        sink: &dyn ReplySink,
    ) -> Result<(), StageError> {
        request.stage = Stage::Delivering;

        let summary = request.summary.as_deref().unwrap_or_default();
        let combined = format!("{}\n\n{}", SUMMARY_HEADER, summary);

        for chunk in chunk_text(&combined, MAX_REPLY_CHARS) {
            sink.reply(&chunk, ReplyFormat::Markdown)
                .await
                .map_err(StageError::Delivery)?;
        }

        if let Some(transcript) = request.transcript.as_deref() {
            let fragment = preview(transcript, PREVIEW_CHARS);
            let reply = format!("{}\n\n{}", TRANSCRIPT_HEADER, fragment);
            sink.reply(&reply, ReplyFormat::Markdown)
                .await
                .map_err(StageError::Delivery)?;
        }

        Ok(())
    }

    async fn notify(&self, sink: &dyn ReplySink, text: &str) {
        if let Err(e) = sink.reply(text, ReplyFormat::Plain).await {
            warn!(error = %e, "progress notification failed");
        }
    }
}
