//! Telegram Bot API adapter.
//!
//! Inbound messages arrive via `getUpdates` long polling; outbound
//! replies go through `sendMessage`. Voice and audio attachments are
//! resolved to a download URL with `getFile`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{ReplyFormat, ReplySink};

/// Response envelope used by every Bot API method
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// One long-polling update
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// An inbound chat message
#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    /// Unix timestamp (seconds) assigned by Telegram
    pub date: i64,
    pub text: Option<String>,
    pub voice: Option<FileRef>,
    pub audio: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Reference to an uploaded file (voice note or audio attachment)
#[derive(Debug, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

/// Message result from sendMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Download URL for a resolved file path
    fn file_url(&self, file_path: &str) -> String {
        format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot_token, file_path
        )
    }

    /// Fetch pending updates, blocking server-side up to `timeout_secs`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let url = self.api_url("getUpdates");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
            ])
            .send()
            .await
            .context("Failed to poll Telegram updates")?;

        let result: TelegramResponse<Vec<Update>> = response
            .json()
            .await
            .context("Failed to parse Telegram updates")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        Ok(result.result.unwrap_or_default())
    }

    /// Resolve a file_id to its download URL
    pub async fn get_file_url(&self, file_id: &str) -> Result<String> {
        let url = self.api_url("getFile");

        let response = self
            .client
            .get(&url)
            .query(&[("file_id", file_id)])
            .send()
            .await
            .context("Failed to resolve Telegram file")?;

        let result: TelegramResponse<FileInfo> = response
            .json()
            .await
            .context("Failed to parse Telegram file info")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        let file_path = result
            .result
            .and_then(|info| info.file_path)
            .context("Telegram file info has no file_path")?;

        Ok(self.file_url(&file_path))
    }

    /// Send a text message to a chat
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        format: ReplyFormat,
    ) -> Result<i64> {
        let url = self.api_url("sendMessage");

        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if format == ReplyFormat::Markdown {
            payload["parse_mode"] = serde_json::json!("Markdown");
        }

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send Telegram message")?;

        let result: TelegramResponse<MessageResult> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        Ok(result.result.map(|r| r.message_id).unwrap_or(0))
    }

    /// Ordered reply sink bound to one chat
    pub fn sink(&self, chat_id: i64) -> ChatSink {
        ChatSink {
            client: self.clone(),
            chat_id,
        }
    }
}

/// ReplySink implementation delivering to a single Telegram chat
pub struct ChatSink {
    client: TelegramClient,
    chat_id: i64,
}

#[async_trait]
impl ReplySink for ChatSink {
    async fn reply(&self, text: &str, format: ReplyFormat) -> Result<()> {
        self.client.send_message(self.chat_id, text, format).await?;
        Ok(())
    }
}
