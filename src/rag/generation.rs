//! Answer generation via the DashScope text-generation API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

// ============================================================================
// AnswerGenerator Trait
// ============================================================================

/// One turn of the chat payload sent to the generation model.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produces an answer for the given chat turns. Errors are upstream
    /// failures (network, auth, malformed payload); the pipeline converts
    /// them into an apology answer rather than surfacing them.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

// ============================================================================
// DashScope Generator
// ============================================================================

/// DashScope text-generation endpoint.
const DASHSCOPE_GENERATION_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";

/// DashScope chat-generation client (`qwen-plus` in the reference
/// deployment).
#[derive(Debug)]
pub struct DashScopeGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl DashScopeGenerator {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        // Generation is the slowest hop of a question; give it more room
        // than the embedding and rerank calls.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_key.clone(), config.generation_model.clone())
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
    parameters: GenerationParameters<'a>,
}

#[derive(Debug, Serialize)]
struct GenerationInput<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Serialize)]
struct GenerationParameters<'a> {
    result_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    output: GenerationOutput,
}

#[derive(Debug, Deserialize)]
struct GenerationOutput {
    choices: Vec<GenerationChoice>,
}

#[derive(Debug, Deserialize)]
struct GenerationChoice {
    message: GenerationMessage,
}

#[derive(Debug, Deserialize)]
struct GenerationMessage {
    content: String,
}

#[async_trait]
impl AnswerGenerator for DashScopeGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = GenerationRequest {
            model: &self.model,
            input: GenerationInput { messages },
            parameters: GenerationParameters {
                result_format: "message",
            },
        };

        let response = self
            .client
            .post(DASHSCOPE_GENERATION_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::AnswerGeneration(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::AnswerGeneration(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::AnswerGeneration(format!("{}: {}", status, body)));
        }

        let parsed: GenerationResponse = serde_json::from_str(&body)
            .map_err(|e| Error::AnswerGeneration(format!("malformed response: {}", e)))?;

        parsed
            .output
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::AnswerGeneration("response carried no choices".to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user("What is indexing?"),
        ];
        let request = GenerationRequest {
            model: "qwen-plus",
            input: GenerationInput {
                messages: &messages,
            },
            parameters: GenerationParameters {
                result_format: "message",
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen-plus");
        assert_eq!(json["input"]["messages"][0]["role"], "system");
        assert_eq!(json["input"]["messages"][1]["content"], "What is indexing?");
        assert_eq!(json["parameters"]["result_format"], "message");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "output": {"choices": [{"finish_reason": "stop",
                "message": {"role": "assistant", "content": "An answer."}}]},
            "usage": {"total_tokens": 12},
            "request_id": "abc"
        }"#;

        let parsed: GenerationResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.output.choices[0].message.content, "An answer.");
    }

    #[test]
    fn test_empty_choices_is_an_error_shape() {
        let body = r#"{"output": {"choices": []}}"#;
        let parsed: GenerationResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.output.choices.is_empty());
    }
}
