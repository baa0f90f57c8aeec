//! Context Assembler - 근거 컨텍스트 조립
//!
//! 질문 임베딩 → top-K 검색 → 유사도 내림차순으로 텍스트 연결.
//! 토큰 예산(문자 수 / 4, 올림)을 넘으면 유사도가 가장 낮은 매치부터 제외합니다.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::knowledge::{RetrievalMatch, VectorIndex, DEFAULT_TOP_K};

/// 매치 텍스트 구분자
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// 추정 토큰 수 (ceil(chars / 4))
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// 예산에 맞게 매치 선택 (입력은 유사도 내림차순)
///
/// 연결 결과가 예산 안에 들어올 때까지 가장 낮은 유사도 매치를 뒤에서부터 제외합니다.
/// 단독으로 예산을 넘는 매치도 제외됩니다. `budget == 0`이면 제한 없음.
pub fn fit_to_budget(matches: Vec<RetrievalMatch>, budget: usize) -> Vec<RetrievalMatch> {
    if budget == 0 {
        return matches;
    }

    let mut kept: Vec<RetrievalMatch> = matches
        .into_iter()
        .filter(|m| {
            let fits = estimate_tokens(&m.text) <= budget;
            if !fits {
                tracing::warn!(id = %m.id, "Dropping match larger than the context budget");
            }
            fits
        })
        .collect();

    while !kept.is_empty() && estimate_tokens(&join_matches(&kept)) > budget {
        if let Some(dropped) = kept.pop() {
            tracing::debug!(id = %dropped.id, score = dropped.score, "Dropping match to fit context budget");
        }
    }

    kept
}

fn join_matches(matches: &[RetrievalMatch]) -> String {
    matches
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

// ============================================================================
// ContextAssembler
// ============================================================================

/// 컨텍스트 조립기
#[derive(Clone)]
pub struct ContextAssembler {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    token_budget: usize,
}

impl ContextAssembler {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            top_k: DEFAULT_TOP_K,
            token_budget: 0,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// 토큰 예산 (0이면 제한 없음)
    pub fn with_token_budget(mut self, budget: usize) -> Self {
        self.token_budget = budget;
        self
    }

    /// 검색 (예산 적용 후, 유사도 내림차순)
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievalMatch>, RetrievalError> {
        let vector = self.embedder.embed(question).await?;
        let matches = self.index.query(&vector, self.top_k).await?;
        let found = matches.len();

        let kept = fit_to_budget(matches, self.token_budget);
        if kept.len() < found {
            tracing::warn!(
                match_count = found,
                kept = kept.len(),
                budget = self.token_budget,
                "Context trimmed to token budget"
            );
        }

        Ok(kept)
    }

    /// 컨텍스트 문자열 조립 (매치가 없으면 빈 문자열)
    pub async fn assemble(&self, question: &str) -> Result<String, RetrievalError> {
        let matches = self.retrieve(question).await?;
        tracing::debug!(match_count = matches.len(), "Assembled context");
        Ok(join_matches(&matches))
    }
}
