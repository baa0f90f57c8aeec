//! 모델 프로파일 - 기능(재작성/생성)별 모델 설정
//!
//! 재작성과 답변 생성은 같은 [`ChatModel`](crate::llm::ChatModel) 호출 경로를 공유하며,
//! 모델 이름과 시스템 프롬프트, temperature만 프로파일로 구분합니다.

use serde::{Deserialize, Serialize};

use crate::config::ChatBackend;

/// 기본 temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// 생성 프롬프트의 대체 메시지 자리표시자
pub const FALLBACK_PLACEHOLDER: &str = "{fallback}";

/// 생성 프롬프트의 컨텍스트 자리표시자
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// 질의 재작성 시스템 프롬프트
const REWRITE_PROMPT: &str = "You rewrite follow-up questions for a document search engine. \
Using the conversation so far, turn the user's latest question into one complete question \
that can be understood without the conversation.\n\
Rules:\n\
1. Replace pronouns and elliptical references (\"it\", \"that\", \"what time?\") with the things they refer to in the conversation.\n\
2. Keep names, course codes, dates and technical terms exactly as written.\n\
3. Write the question in English, even if the user wrote in another language.\n\
4. If the question is already standalone, return it unchanged in meaning.\n\
Output only the rewritten question. No preamble, no quotes, no explanation.";

/// 답변 생성 시스템 프롬프트 템플릿
const GENERATE_PROMPT: &str = "You are CampusQuery, the student help assistant of \
JSS Academy of Technical Education, Noida. Answer student questions in a friendly, \
helpful and concise way. If the student greets you, greet them back and ask how you can help.\n\n\
Reply in the same language the student used in their latest message.\n\n\
Answer only from the provided context. This applies especially to notices, circulars, \
notifications, dates and fees. If the context does not contain the answer, reply exactly:\n\
\"{fallback}\"\n\n\
Context:\n{context}";

// ============================================================================
// Capability / ModelProfile
// ============================================================================

/// 모델 호출 기능
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// 후속 질문 → 독립 질문
    Rewrite,
    /// 컨텍스트 기반 답변 생성
    Generate,
}

/// 기능별 모델 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
}

impl ModelProfile {
    /// 백엔드 기본 프로파일
    pub fn default_for(capability: Capability, backend: ChatBackend) -> Self {
        let system_prompt = match capability {
            Capability::Rewrite => REWRITE_PROMPT,
            Capability::Generate => GENERATE_PROMPT,
        };

        Self {
            model: backend.default_model().to_string(),
            system_prompt: system_prompt.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// 생성 프롬프트 렌더링 (자리표시자 치환)
    pub fn render(&self, fallback: &str, context: &str) -> String {
        self.system_prompt
            .replace(FALLBACK_PLACEHOLDER, fallback)
            .replace(CONTEXT_PLACEHOLDER, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_per_backend() {
        let gemini = ModelProfile::default_for(Capability::Generate, ChatBackend::Gemini);
        assert_eq!(gemini.model, "gemini-2.0-flash");
        assert!((gemini.temperature - 0.2).abs() < f32::EPSILON);

        let openai = ModelProfile::default_for(Capability::Rewrite, ChatBackend::OpenAi);
        assert_eq!(openai.model, "gpt-4o");
        assert!(openai.system_prompt.contains("Output only the rewritten question"));
    }

    #[test]
    fn test_render_fills_placeholders() {
        let profile = ModelProfile::default_for(Capability::Generate, ChatBackend::Gemini);
        let prompt = profile.render("Ask the helpdesk.", "Exams start on 12 May 2025.");

        assert!(prompt.contains("CampusQuery"));
        assert!(prompt.contains("\"Ask the helpdesk.\""));
        assert!(prompt.ends_with("Exams start on 12 May 2025."));
        assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
    }
}
