//! Response Generator - 최종 답변 생성
//!
//! 시스템 프롬프트(페르소나 + 컨텍스트) + 전체 대화 기록 + 원래 질문으로
//! LLM을 호출합니다. 성공하면 질문/답변 쌍을 세션에 추가하고, 실패하면 아무것도 추가하지 않습니다.

use std::sync::Arc;

use crate::chat::profile::ModelProfile;
use crate::chat::session::{SessionGuard, Turn};
use crate::error::GenerationError;
use crate::llm::{ChatModel, ChatRequest};

/// 답변 생성기
#[derive(Clone)]
pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
    profile: ModelProfile,
    fallback_message: String,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>, profile: ModelProfile, fallback_message: impl Into<String>) -> Self {
        Self {
            model,
            profile,
            fallback_message: fallback_message.into(),
        }
    }

    /// 요청 구성 (기록 + 원래 질문)
    fn build_request(&self, question: &str, context: &str, history: &[Turn]) -> ChatRequest {
        let mut messages = history.to_vec();
        messages.push(Turn::user(question));

        ChatRequest {
            system: self.profile.render(&self.fallback_message, context),
            messages,
            temperature: self.profile.temperature,
        }
    }

    /// 답변 생성 후 세션에 기록
    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        session: &mut SessionGuard,
    ) -> Result<String, GenerationError> {
        let request = self.build_request(question, context, session.turns());

        let answer = self.model.complete(&self.profile.model, &request).await?;
        let answer = answer.trim().to_string();

        session.record_exchange(question, answer.clone());
        tracing::info!(
            session_id = session.session_id(),
            model = %self.profile.model,
            "Generated answer"
        );

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::SessionMemory;
    use async_trait::async_trait;

    struct Echo {
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String, GenerationError> {
            if self.fail {
                return Err(GenerationError::new(model, "unavailable"));
            }
            Ok(format!(" {} ", request.messages.len()))
        }

        fn backend(&self) -> &str {
            "echo"
        }
    }

    fn profile() -> ModelProfile {
        ModelProfile {
            model: "gen".to_string(),
            system_prompt: "Fallback: {fallback}\nContext: {context}".to_string(),
            temperature: 0.2,
        }
    }

    #[test]
    fn test_build_request_renders_context() {
        let generator = ResponseGenerator::new(Arc::new(Echo { fail: false }), profile(), "Ask staff.");
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let request = generator.build_request("when?", "Exams start on 12 May 2025.", &history);

        assert_eq!(request.system, "Fallback: Ask staff.\nContext: Exams start on 12 May 2025.");
        assert_eq!(request.messages.last(), Some(&Turn::user("when?")));
        assert_eq!(request.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_generate_appends_exchange() {
        let memory = SessionMemory::default();
        let generator = ResponseGenerator::new(Arc::new(Echo { fail: false }), profile(), "Ask staff.");

        let mut guard = memory.lock("s").await;
        let answer = generator.generate("when?", "ctx", &mut guard).await.unwrap();
        assert_eq!(answer, "1");
        assert_eq!(guard.turns(), &[Turn::user("when?"), Turn::assistant("1")]);
    }

    #[tokio::test]
    async fn test_failure_appends_nothing() {
        let memory = SessionMemory::default();
        let generator = ResponseGenerator::new(Arc::new(Echo { fail: true }), profile(), "Ask staff.");

        let mut guard = memory.lock("s").await;
        assert!(generator.generate("when?", "ctx", &mut guard).await.is_err());
        assert!(guard.turns().is_empty());
    }
}
