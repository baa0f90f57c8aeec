//! LLM 모듈 - 채팅 모델 호출
//!
//! 질의 재작성과 답변 생성이 공유하는 단일 호출 경로입니다.
//! - Gemini: generateContent (기본)
//! - OpenAI 호환: chat/completions

pub mod gemini;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::chat::Turn;
use crate::config::{ChatBackend, EngineConfig};
use crate::error::GenerationError;

pub use gemini::GeminiChat;
pub use openai::OpenAiChat;

/// 채팅 요청
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// 시스템 지시
    pub system: String,
    /// 대화 메시지 (마지막이 현재 사용자 메시지)
    pub messages: Vec<Turn>,
    pub temperature: f32,
}

/// 채팅 모델 트레이트
///
/// 실패 시 재시도 없이 [`GenerationError`]를 반환합니다.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 응답 텍스트 생성
    async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String, GenerationError>;

    /// 백엔드 이름
    fn backend(&self) -> &str;
}

/// 설정에 맞는 채팅 모델 생성
pub fn from_config(config: &EngineConfig) -> anyhow::Result<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match config.chat_backend {
        ChatBackend::Gemini => {
            let api_key = crate::embedding::get_api_key().ok_or_else(|| {
                anyhow::anyhow!("GEMINI_API_KEY or GOOGLE_AI_API_KEY is required for the Gemini backend")
            })?;
            Arc::new(GeminiChat::new(api_key)?.with_base_url(&config.gemini_base_url))
        }
        ChatBackend::OpenAi => {
            let api_key = openai::get_api_key()
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required for the OpenAI backend"))?;
            Arc::new(OpenAiChat::new(api_key)?.with_base_url(&config.openai_base_url))
        }
    };
    Ok(model)
}
