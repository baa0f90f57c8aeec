//! OpenAI 호환 채팅 모델 (chat/completions)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChatModel, ChatRequest};
use crate::chat::Role;
use crate::error::GenerationError;

/// OpenAI API 기본 URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// `OPENAI_API_KEY` 환경변수
pub fn get_api_key() -> Option<String> {
    std::env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty())
}

/// OpenAI 호환 클라이언트
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(api_key: String) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| GenerationError::new("openai", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_to_json(request: &ChatRequest) -> Vec<serde_json::Value> {
        std::iter::once(json!({"role": "system", "content": request.system}))
            .chain(request.messages.iter().map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({"role": role, "content": turn.content})
            }))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": Self::messages_to_json(request),
            "temperature": request.temperature,
            "stream": false,
        });

        tracing::debug!(url = %url, model, "Sending OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(model, error = %e, "chat completion request failed");
                GenerationError::new(model, format!("Request failed: {}", e))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::new(model, format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::error!(model, %status, "chat completion request rejected");
            return Err(GenerationError::new(
                model,
                format!("OpenAI API error ({}): {}", status, text),
            ));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::new(model, format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GenerationError::new(model, "Model returned an empty response"))
    }

    fn backend(&self) -> &str {
        "openai"
    }
}
