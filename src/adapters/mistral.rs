//! Chat-completion client for meeting analysis.
//!
//! Sends the transcript with a fixed analysis prompt to a Mistral-style
//! chat-completion endpoint. Output length is capped and temperature
//! kept low so summaries stay extractive rather than creative. Any
//! failure degrades to a fixed localized fallback message.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{Analysis, Analyzer};

/// Delivered instead of a summary when the analysis fails.
pub const FALLBACK_MESSAGE: &str = "Не удалось проанализировать встречу.";

const SYSTEM_PROMPT: &str = "Ты профессиональный ассистент для анализа деловых встреч. \
    Ты создаешь четкие, структурированные резюме.";

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.3;

/// The fixed analysis prompt wrapped around the meeting text.
fn build_prompt(transcript: &str) -> String {
    format!(
        "Ты ассистент для анализа деловых встреч. Проанализируй текст встречи и создай структурированное резюме.\n\
         \n\
         Текст встречи:\n\
         {transcript}\n\
         \n\
         Создай краткое содержание по следующей структуре:\n\
         1. Участники встречи (кто присутствовал)\n\
         2. Основные темы обсуждения\n\
         3. Принятые решения и выводы\n\
         4. Назначенные задачи (что, кто, сроки)\n\
         5. Следующие шаги и дата следующей встречи\n\
         \n\
         Будь лаконичным и выделяй самое важное.\n\
         \n\
         не составляй никаких таблиц"
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Chat-completion client
pub struct SummarizationClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl SummarizationClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn summarize_inner(&self, text: &str) -> Result<String> {
        let prompt = build_prompt(text);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("chat-completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("chat-completion endpoint returned {}", status);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("failed to parse chat-completion response")?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .context("chat-completion response has no choices")?;

        Ok(choice.message.content)
    }
}

#[async_trait]
impl Analyzer for SummarizationClient {
    async fn summarize(&self, text: &str) -> Analysis {
        match self.summarize_inner(text).await {
            Ok(summary) => {
                info!("meeting analysis completed");
                Analysis::Summary(summary)
            }
            Err(e) => {
                error!(error = %e, "meeting analysis failed");
                Analysis::Fallback(FALLBACK_MESSAGE.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_structure() {
        let prompt = build_prompt("обсудили планы");

        assert!(prompt.contains("обсудили планы"));
        assert!(prompt.contains("Участники встречи"));
        assert!(prompt.contains("Основные темы обсуждения"));
        assert!(prompt.contains("Принятые решения и выводы"));
        assert!(prompt.contains("Назначенные задачи"));
        assert!(prompt.contains("Следующие шаги"));
        assert!(prompt.contains("не составляй никаких таблиц"));
    }

    #[test]
    fn test_request_wire_format() {
        let prompt = build_prompt("текст");
        let request = ChatRequest {
            model: "mistral-medium",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "mistral-medium");
        assert_eq!(value["max_tokens"], 500);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!((value["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }
}
