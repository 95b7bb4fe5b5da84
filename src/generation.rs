use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::GeneratorConfig;

/// Instruction sent with every request; the prompt template lives here and
/// nowhere else.
const SYSTEM_PROMPT: &str = "You are an expert Streamlit developer. \
Produce a complete, runnable single-file Streamlit app. \
Start with st.set_page_config. Use a modern UI. Output code only, no prose.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation API key is not configured")]
    MissingCredential,
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation endpoint returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("generation response contained no completion")]
    EmptyCompletion,
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create reqwest client");
        Self { client, config }
    }

    fn build_request(&self, prompt: &str) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Create a Streamlit app: {prompt}"),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl CodeGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenerationError::MissingCredential)?;

        let body = self.build_request(prompt);
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "generation endpoint returned error");
            return Err(GenerationError::UpstreamStatus { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        let raw = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GenerationError::EmptyCompletion)?;

        debug!(chars = raw.len(), "completion received");
        Ok(strip_code_fences(&raw))
    }
}

/// Remove a leading fenced-code marker (with optional language tag) and a
/// trailing fence, then trim surrounding whitespace. Text without fences
/// passes through trimmed.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn config_without_key() -> GeneratorConfig {
        GeneratorConfig {
            api_key: None,
            endpoint: "http://localhost:0".into(),
            model: "test-model".into(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }

    #[test]
    fn strips_language_tagged_fence() {
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fences("```\nprint(1)\n```"), "print(1)");
    }

    #[test]
    fn trims_text_without_fences() {
        assert_eq!(strip_code_fences("  print(1)\n"), "print(1)");
    }

    #[test]
    fn strips_surrounding_whitespace_around_fences() {
        assert_eq!(
            strip_code_fences("\n```python\nimport streamlit as st\n```\n"),
            "import streamlit as st"
        );
    }

    #[test]
    fn keeps_inner_fences_untouched() {
        let raw = "```python\nprint(\"```\")\nprint(2)\n```";
        assert_eq!(strip_code_fences(raw), "print(\"```\")\nprint(2)");
    }

    #[test]
    fn request_body_has_expected_shape() {
        let generator = OpenAiGenerator::new(config_without_key());
        let body = serde_json::to_value(generator.build_request("calculator")).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("calculator"));
    }

    #[test]
    fn response_payload_parses() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"```python\nprint(1)\n```"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        let content = parsed.choices.into_iter().next().unwrap().message.content;
        assert_eq!(strip_code_fences(&content), "print(1)");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_network_call() {
        let generator = OpenAiGenerator::new(config_without_key());
        let err = generator.generate("calculator").await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingCredential));
    }
}
