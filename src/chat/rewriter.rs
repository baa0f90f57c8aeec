//! Query Rewriter - 후속 질문을 독립 질문으로 변환
//!
//! 대화 기록 + 질문으로 LLM을 한 번 호출합니다. 기록이 비어 있어도 호출하며
//! (영어 정규화), 실패 시 재시도 없이 [`GenerationError`]를 반환합니다.

use std::sync::Arc;

use crate::chat::profile::ModelProfile;
use crate::chat::session::Turn;
use crate::error::GenerationError;
use crate::llm::{ChatModel, ChatRequest};

/// 질의 재작성기
#[derive(Clone)]
pub struct QueryRewriter {
    model: Arc<dyn ChatModel>,
    profile: ModelProfile,
}

impl QueryRewriter {
    pub fn new(model: Arc<dyn ChatModel>, profile: ModelProfile) -> Self {
        Self { model, profile }
    }

    /// 독립 질문 생성
    pub async fn rewrite(&self, question: &str, history: &[Turn]) -> Result<String, GenerationError> {
        let mut messages = history.to_vec();
        messages.push(Turn::user(question));

        let request = ChatRequest {
            system: self.profile.system_prompt.clone(),
            messages,
            temperature: self.profile.temperature,
        };

        let raw = self.model.complete(&self.profile.model, &request).await?;
        let rewritten = clean_rewrite(&raw).ok_or_else(|| {
            GenerationError::new(self.profile.model.clone(), "Rewrite produced an empty question")
        })?;

        tracing::debug!(original = question, rewritten = %rewritten, "Rewrote query");
        Ok(rewritten)
    }
}

/// 모델 출력 정리: 첫 비어있지 않은 줄, 앞뒤 따옴표 제거
fn clean_rewrite(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;
    let line = line
        .trim_start_matches(['"', '\'', '`', '“'])
        .trim_end_matches(['"', '\'', '`', '”'])
        .trim();

    (!line.is_empty()).then(|| line.to_string())
}
