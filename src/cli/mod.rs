//! Command-line interface for protokol.
//!
//! `run` starts the Telegram bot; `summarize` runs the text path
//! locally against a file or stdin, printing replies to stdout.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::telegram::Message;
use crate::adapters::{
    OAuthExchanger, ReplyFormat, ReplySink, SummarizationClient, TelegramClient, TokenCache,
    TranscriptionClient,
};
use crate::config::Config;
use crate::core::{InboundMessage, InboundPayload, Orchestrator};
use crate::ingest::AudioIngestion;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

const MSG_NO_AUDIO_FILE: &str = "❌ Не удалось получить аудио файл.";

const WELCOME_TEXT: &str = "🎤 **Голосовой ассистент для встреч**\n\
    \n\
    Отправьте мне голосовое сообщение, аудиофайл или текст с записью встречи, и я:\n\
    1. 🎵 Распознаю речь через SaluteSpeech (при отправке аудио)\n\
    2. 🤖 Проанализирую содержание через Mistral AI\n\
    3. 📋 Создам структурированное резюме встречи\n\
    \n\
    **Что я выделяю:**\n\
    • Участники встречи\n\
    • Основные темы обсуждения\n\
    • Принятые решения\n\
    • Назначенные задачи\n\
    • Следующие шаги\n\
    \n\
    Просто отправьте голосовое сообщение, аудиофайл или текст и получите анализ!";

const HELP_TEXT: &str = "📋 **Как использовать бота:**\n\
    \n\
    1. **Запись встречи**: Запишите голосовое сообщение во время встречи\n\
    2. **Отправка**: Отправьте аудио сообщение или текст боту\n\
    3. **Обработка**: Бот автоматически:\n\
       - Распознает речь (при отправке аудио)\n\
       - Проанализирует содержание через AI\n\
       - Создаст структурированное резюме\n\
    \n\
    **Поддерживаемые форматы:**\n\
    • Голосовые сообщения (лучшее качество)\n\
    • Аудио файлы (MP3, OGG, WAV)\n\
    • Текстовые сообщения (для прямого анализа)\n\
    \n\
    **Советы для лучшего качества:**\n\
    • Говорите четко и разборчиво\n\
    • Избегайте фонового шума\n\
    • Записывайте в тихом помещении";

/// protokol - Telegram meeting assistant
#[derive(Parser, Debug)]
#[command(name = "protokol")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Telegram bot (long polling)
    Run,

    /// Summarize a meeting transcript from a file (or stdin)
    Summarize {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run => run_bot().await,
            Commands::Summarize { input } => summarize_local(input).await,
        }
    }
}

/// Build the orchestrator from resolved configuration.
fn build_orchestrator(config: &Config) -> Orchestrator {
    let exchanger = Arc::new(OAuthExchanger::new(
        config.asr_oauth_url.clone(),
        config.asr_auth_key.clone(),
        config.asr_scope.clone(),
    ));
    let tokens = Arc::new(TokenCache::new(exchanger));

    Orchestrator::new(
        Arc::new(AudioIngestion::new(config.ffmpeg_path.clone())),
        Arc::new(TranscriptionClient::new(
            config.asr_recognize_url.clone(),
            tokens,
        )),
        Arc::new(SummarizationClient::new(
            config.llm_api_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model.clone(),
        )),
        config.temp_dir.clone(),
    )
}

async fn run_bot() -> Result<()> {
    let config = Config::load()?;

    tokio::fs::create_dir_all(&config.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp dir {}", config.temp_dir.display()))?;

    let telegram = TelegramClient::new(config.telegram_bot_token.clone());
    let orchestrator = Arc::new(build_orchestrator(&config));

    info!("meeting assistant started");

    let mut offset = 0i64;
    loop {
        let updates = match telegram.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "update poll failed");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };

            // Each message runs in its own task; a stalled provider
            // call stalls only that request
            let telegram = telegram.clone();
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                dispatch(telegram, orchestrator, message).await;
            });
        }
    }
}

/// Route one inbound Telegram message.
async fn dispatch(telegram: TelegramClient, orchestrator: Arc<Orchestrator>, message: Message) {
    let sink = telegram.sink(message.chat.id);
    let user_id = message.from.as_ref().map(|u| u.id).unwrap_or(message.chat.id);

    // Commands
    if let Some(text) = message.text.as_deref() {
        let reply = match text.trim() {
            "/start" => Some(WELCOME_TEXT),
            "/help" => Some(HELP_TEXT),
            _ => None,
        };
        if let Some(reply) = reply {
            if let Err(e) = sink.reply(reply, ReplyFormat::Markdown).await {
                warn!(error = %e, "failed to send command reply");
            }
            return;
        }
    }

    let payload = if let Some(file) = message.voice.as_ref().or(message.audio.as_ref()) {
        match telegram.get_file_url(&file.file_id).await {
            Ok(download_url) => InboundPayload::Audio { download_url },
            Err(e) => {
                warn!(error = %e, "failed to resolve audio file");
                if let Err(e) = sink.reply(MSG_NO_AUDIO_FILE, ReplyFormat::Plain).await {
                    warn!(error = %e, "failed to send failure notice");
                }
                return;
            }
        }
    } else if let Some(text) = message.text {
        InboundPayload::Text(text.trim().to_string())
    } else {
        return;
    };

    let inbound = InboundMessage {
        user_id,
        received_at: Utc::now(),
        payload,
    };

    orchestrator.handle_message(inbound, &sink).await;
}

/// ReplySink printing to stdout, for local runs
struct StdoutSink;

#[async_trait]
impl ReplySink for StdoutSink {
    async fn reply(&self, text: &str, _format: ReplyFormat) -> Result<()> {
        println!("{}\n", text);
        Ok(())
    }
}

async fn summarize_local(input: Option<PathBuf>) -> Result<()> {
    // Full config load on purpose: every subcommand validates the same
    // credential set at startup, even though this path never talks to
    // Telegram.
    let config = Config::load()?;
    let orchestrator = build_orchestrator(&config);

    let text = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    let inbound = InboundMessage {
        user_id: 0,
        received_at: Utc::now(),
        payload: InboundPayload::Text(text.trim().to_string()),
    };

    orchestrator.handle_message(inbound, &StdoutSink).await;
    Ok(())
}
