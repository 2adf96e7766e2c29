//! Audio ingestion: download and format normalization.

pub mod audio;

use std::path::Path;

use async_trait::async_trait;

pub use audio::{AudioContainer, AudioIngestion, DownloadError, NormalizeError};

/// Fetch and normalize remote audio.
///
/// Both operations report failure without retrying; the orchestrator
/// turns a failure into a stage-specific user message.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Download a remote resource to `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;

    /// Produce the recognizer's input profile at `dest`.
    async fn normalize(&self, src: &Path, dest: &Path) -> Result<(), NormalizeError>;
}
