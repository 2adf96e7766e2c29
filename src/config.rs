//! Configuration for protokol.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TELEGRAM_BOT_TOKEN, MISTRAL_API_KEY, ...)
//! 2. Config file (.protokol/config.yaml, searched from the current
//!    directory upward, then ~/.protokol/config.yaml)
//! 3. Built-in defaults (provider endpoints, model, temp dir)
//!
//! The three provider credentials and nothing else are required;
//! loading fails fast naming every missing variable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_RECOGNIZE_URL: &str = "https://smartspeech.sber.ru/rest/v1/speech:recognize";
const DEFAULT_OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
const DEFAULT_ASR_SCOPE: &str = "SALUTE_SPEECH_PERS";
const DEFAULT_LLM_URL: &str = "https://api.mistral.ai/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "mistral-medium";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_TEMP_DIR: &str = "temp_audio";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub telegram: TelegramSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub asr: AsrSection,
    #[serde(default)]
    pub audio: AudioSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AsrSection {
    pub auth_key: Option<String>,
    pub scope: Option<String>,
    pub oauth_url: Option<String>,
    pub recognize_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioSection {
    pub ffmpeg_path: Option<String>,
    pub temp_dir: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub llm_model: String,
    pub asr_auth_key: String,
    pub asr_scope: String,
    pub asr_oauth_url: String,
    pub asr_recognize_url: String,
    pub ffmpeg_path: String,
    pub temp_dir: PathBuf,
}

/// Find a config file by searching the current directory and its
/// parents, then the home directory.
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let candidate = current.join(".protokol").join("config.yaml");
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }
    }

    let home = dirs::home_dir()?.join(".protokol").join("config.yaml");
    home.exists().then_some(home)
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve the final configuration from a parsed file and an env lookup.
///
/// The lookup is a closure so tests can supply their own environment
/// without mutating process state.
fn resolve(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let telegram_bot_token = env("TELEGRAM_BOT_TOKEN").or(file.telegram.bot_token);
    let llm_api_key = env("MISTRAL_API_KEY").or(file.llm.api_key);
    let asr_auth_key = env("SALUTE_SPEECH_AUTH_KEY").or(file.asr.auth_key);

    let mut missing = Vec::new();
    if telegram_bot_token.is_none() {
        missing.push("TELEGRAM_BOT_TOKEN");
    }
    if llm_api_key.is_none() {
        missing.push("MISTRAL_API_KEY");
    }
    if asr_auth_key.is_none() {
        missing.push("SALUTE_SPEECH_AUTH_KEY");
    }
    if !missing.is_empty() {
        anyhow::bail!("Missing required configuration: {}", missing.join(", "));
    }

    let temp_dir = env("PROTOKOL_TEMP_DIR")
        .or(file.audio.temp_dir)
        .unwrap_or_else(|| DEFAULT_TEMP_DIR.to_string());

    Ok(Config {
        telegram_bot_token: telegram_bot_token.unwrap(),
        llm_api_key: llm_api_key.unwrap(),
        llm_api_url: file
            .llm
            .api_url
            .unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
        llm_model: env("MISTRAL_MODEL")
            .or(file.llm.model)
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        asr_auth_key: asr_auth_key.unwrap(),
        asr_scope: env("SALUTE_SPEECH_SCOPE")
            .or(file.asr.scope)
            .unwrap_or_else(|| DEFAULT_ASR_SCOPE.to_string()),
        asr_oauth_url: file
            .asr
            .oauth_url
            .unwrap_or_else(|| DEFAULT_OAUTH_URL.to_string()),
        asr_recognize_url: file
            .asr
            .recognize_url
            .unwrap_or_else(|| DEFAULT_RECOGNIZE_URL.to_string()),
        ffmpeg_path: env("FFMPEG_PATH")
            .or(file.audio.ffmpeg_path)
            .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string()),
        temp_dir: PathBuf::from(temp_dir),
    })
}

impl Config {
    /// Load configuration from all sources, failing fast when a
    /// required credential is absent.
    pub fn load() -> Result<Self> {
        let file = match find_config_file() {
            Some(path) => load_config_file(&path)?,
            None => ConfigFile::default(),
        };

        resolve(file, |key| std::env::var(key).ok())
    }
}
