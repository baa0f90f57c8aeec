//! Gemini 채팅 모델
//!
//! generateContent 엔드포인트로 시스템 지시 + 대화 내용을 보냅니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatModel, ChatRequest};
use crate::chat::Role;
use crate::embedding::{GeminiError, GEMINI_API_BASE};
use crate::error::GenerationError;

/// Gemini generateContent 클라이언트
#[derive(Debug, Clone)]
pub struct GeminiChat {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GeminiChat {
    pub fn new(api_key: String) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| GenerationError::new("gemini", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: request.system.clone(),
                }],
            },
            contents: request
                .messages
                .iter()
                .map(|turn| Content {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    },
                    parts: vec![TextPart {
                        text: turn.content.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        tracing::debug!(model, messages = request.messages.len(), "Sending Gemini generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(model, error = %e, "generateContent request failed");
                GenerationError::new(model, format!("Failed to send request: {}", e))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::new(model, format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::error!(model, %status, "generateContent request rejected");
            let message = match serde_json::from_str::<GeminiError>(&text) {
                Ok(error) => format!("Gemini API error ({}): {}", error.error.status, error.error.message),
                Err(_) => format!("Gemini API error ({}): {}", status, text),
            };
            return Err(GenerationError::new(model, message));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::new(model, format!("Failed to parse response: {}", e)))?;

        // 첫 후보의 텍스트 파트를 이어붙임
        let answer: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(GenerationError::new(model, "Model returned an empty response"));
        }

        Ok(answer)
    }

    fn backend(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: SystemInstruction,
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
