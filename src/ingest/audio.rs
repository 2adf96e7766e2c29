//! Download and ffmpeg-based normalization of audio files.
//!
//! Opus-in-Ogg is the recognizer's native format, so `.ogg` input is
//! copied as-is. Other known containers are transcoded to 16 kHz mono
//! s16 PCM. Unknown extensions are copied through untouched; the
//! recognizer rejects them later without a transcoder run.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use super::AudioSource;

/// Extensions the transcoder is expected to handle.
const TRANSCODABLE: &[&str] = &["wav", "pcm", "mp3", "m4a", "flac", "aac", "wma", "webm"];

/// Container family of a source file, judged by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    /// Opus-in-Ogg, accepted by the recognizer natively
    OpusOgg,
    /// Known container that must go through the transcoder
    Transcodable,
    /// Anything else; passed through and rejected at recognition
    Unknown,
}

impl AudioContainer {
    pub fn classify(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("ogg") => Self::OpusOgg,
            Some(ext) if TRANSCODABLE.contains(&ext) => Self::Transcodable,
            _ => Self::Unknown,
        }
    }

    /// Extension the normalized copy should carry.
    pub fn normalized_extension(self, src: &Path) -> String {
        match self {
            Self::OpusOgg => "ogg".to_string(),
            Self::Transcodable => "wav".to_string(),
            Self::Unknown => src
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin")
                .to_ascii_lowercase(),
        }
    }
}

/// Errors from fetching a remote audio resource
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("download server returned {0}")]
    Status(StatusCode),

    #[error("failed to write downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from normalizing a local audio file
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to run transcoder '{path}': {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },

    #[error("transcoder exited with code {code}: {stderr}")]
    Transcoder { code: i32, stderr: String },

    #[error("io error during normalization: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads remote audio and normalizes it for recognition
pub struct AudioIngestion {
    client: reqwest::Client,
    ffmpeg_path: String,
}

impl AudioIngestion {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Argument list for the fixed transcoder contract:
    /// 16 kHz sample rate, mono, 16-bit signed samples.
    fn transcode_args(src: &Path, dest: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-i"),
            src.as_os_str().to_os_string(),
            OsString::from("-ar"),
            OsString::from("16000"),
            OsString::from("-ac"),
            OsString::from("1"),
            OsString::from("-sample_fmt"),
            OsString::from("s16"),
            dest.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl AudioSource for AudioIngestion {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes).await?;

        info!(path = %dest.display(), bytes = bytes.len(), "audio downloaded");
        Ok(())
    }

    async fn normalize(&self, src: &Path, dest: &Path) -> Result<(), NormalizeError> {
        match AudioContainer::classify(src) {
            AudioContainer::OpusOgg => {
                tokio::fs::copy(src, dest).await?;
                info!(path = %dest.display(), "audio copied (no conversion needed)");
                Ok(())
            }
            AudioContainer::Unknown => {
                // Copied through so cleanup still owns exactly the tracked
                // paths; recognition will reject the extension.
                warn!(path = %src.display(), "unknown audio container, skipping transcode");
                tokio::fs::copy(src, dest).await?;
                Ok(())
            }
            AudioContainer::Transcodable => {
                let output = Command::new(&self.ffmpeg_path)
                    .args(Self::transcode_args(src, dest))
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(|source| NormalizeError::Spawn {
                        path: self.ffmpeg_path.clone(),
                        source,
                    })?;

                if !output.status.success() {
                    return Err(NormalizeError::Transcoder {
                        code: output.status.code().unwrap_or(-1),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    });
                }

                info!(path = %dest.display(), "audio converted");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_container_classification() {
        assert_eq!(
            AudioContainer::classify(Path::new("a.ogg")),
            AudioContainer::OpusOgg
        );
        assert_eq!(
            AudioContainer::classify(Path::new("a.OGG")),
            AudioContainer::OpusOgg
        );
        assert_eq!(
            AudioContainer::classify(Path::new("a.mp3")),
            AudioContainer::Transcodable
        );
        assert_eq!(
            AudioContainer::classify(Path::new("a.wav")),
            AudioContainer::Transcodable
        );
        assert_eq!(
            AudioContainer::classify(Path::new("a.xyz")),
            AudioContainer::Unknown
        );
        assert_eq!(
            AudioContainer::classify(Path::new("noext")),
            AudioContainer::Unknown
        );
    }

    #[test]
    fn test_normalized_extension() {
        let ogg = Path::new("a.ogg");
        let mp3 = Path::new("a.mp3");
        let odd = Path::new("a.xyz");

        assert_eq!(AudioContainer::classify(ogg).normalized_extension(ogg), "ogg");
        assert_eq!(AudioContainer::classify(mp3).normalized_extension(mp3), "wav");
        assert_eq!(AudioContainer::classify(odd).normalized_extension(odd), "xyz");
    }

    #[test]
    fn test_transcode_args_contract() {
        let args = AudioIngestion::transcode_args(Path::new("in.mp3"), Path::new("out.wav"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(
            args,
            vec!["-i", "in.mp3", "-ar", "16000", "-ac", "1", "-sample_fmt", "s16", "out.wav"]
        );
    }

    #[tokio::test]
    async fn test_normalize_ogg_is_a_copy() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("voice.ogg");
        let dest = temp.path().join("normalized.ogg");
        tokio::fs::write(&src, b"opus bytes").await.unwrap();

        // A bogus transcoder path proves the copy branch never spawns it
        let ingestion = AudioIngestion::new("/nonexistent/ffmpeg");
        ingestion.normalize(&src, &dest).await.unwrap();

        let copied = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(copied, b"opus bytes");
    }

    #[tokio::test]
    async fn test_normalize_unknown_extension_skips_transcoder() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("meeting.xyz");
        let dest = temp.path().join("normalized.xyz");
        tokio::fs::write(&src, b"mystery bytes").await.unwrap();

        let ingestion = AudioIngestion::new("/nonexistent/ffmpeg");
        ingestion.normalize(&src, &dest).await.unwrap();

        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_normalize_transcodable_invokes_transcoder() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("meeting.mp3");
        let dest = temp.path().join("normalized.wav");
        tokio::fs::write(&src, b"mp3 bytes").await.unwrap();

        // The bogus path fails at spawn, which proves the branch was taken
        let ingestion = AudioIngestion::new("/nonexistent/ffmpeg");
        let err = ingestion.normalize(&src, &dest).await.unwrap_err();
        assert!(matches!(err, NormalizeError::Spawn { .. }));
    }
}
