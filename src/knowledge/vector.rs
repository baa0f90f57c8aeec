//! Vector Index - 벡터 인덱스 트레이트 및 유틸리티
//!
//! 청크 벡터를 메타데이터와 함께 저장하고 top-K 유사도 검색을 제공합니다.
//! 구현체: [`InMemoryVectorIndex`](super::InMemoryVectorIndex), [`LanceVectorIndex`](super::LanceVectorIndex)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// 기본 top-K
pub const DEFAULT_TOP_K: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// 엔트리 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// 임베딩에 사용된 청크 텍스트 (벡터와 반드시 일치)
    pub text: String,
    /// 원본 문서 ID
    pub source_doc_id: String,
    /// 문서 내 청크 순번
    pub chunk_seq: usize,
}

/// 벡터 인덱스 엔트리 (저장용)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// 엔트리 ID (`{document_id}#{chunk_seq}`)
    pub id: String,
    /// 임베딩 벡터
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

impl VectorEntry {
    /// 문서 ID와 청크 순번으로 엔트리 ID 생성
    pub fn chunk_id(document_id: &str, chunk_seq: usize) -> String {
        format!("{}#{}", document_id, chunk_seq)
    }
}

/// 검색 결과 (유사도 내림차순)
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalMatch {
    pub id: String,
    pub text: String,
    /// 유사도 스코어 (높을수록 유사)
    pub score: f32,
    pub source_doc_id: String,
    pub chunk_seq: usize,
}

impl RetrievalMatch {
    pub(crate) fn from_entry(entry: &VectorEntry, score: f32) -> Self {
        Self {
            id: entry.id.clone(),
            text: entry.metadata.text.clone(),
            score,
            source_doc_id: entry.metadata.source_doc_id.clone(),
            chunk_seq: entry.metadata.chunk_seq,
        }
    }
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// VectorIndex 트레이트 (async)
///
/// - `upsert`: ID 기준 삽입 또는 교체 (멱등)
/// - `query`: 상태를 변경하지 않으며 `upsert`와 동시에 호출해도 안전
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 엔트리 삽입 또는 교체, 처리된 개수 반환
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize, IndexError>;

    /// 가장 가까운 엔트리 최대 `top_k`개 (유사도 내림차순)
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>, IndexError>;

    /// 엔트리 개수
    async fn count(&self) -> Result<usize, IndexError>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 엔트리 벡터 차원 검증
pub(crate) fn check_dimension(
    backend: &str,
    expected: usize,
    entries: &[VectorEntry],
) -> Result<(), IndexError> {
    if let Some(bad) = entries.iter().find(|e| e.vector.len() != expected) {
        return Err(IndexError::new(
            backend,
            format!(
                "entry '{}' has dimension {}, index dimension is {}",
                bad.id,
                bad.vector.len(),
                expected
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_empty() {
        let a: Vec<f32> = vec![];
        let b: Vec<f32> = vec![];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(VectorEntry::chunk_id("doc-7", 3), "doc-7#3");
    }

    #[test]
    fn test_check_dimension() {
        let entry = VectorEntry {
            id: "d#0".to_string(),
            vector: vec![0.0; 3],
            metadata: EntryMetadata {
                text: "t".to_string(),
                source_doc_id: "d".to_string(),
                chunk_seq: 0,
            },
        };
        assert!(check_dimension("test", 3, std::slice::from_ref(&entry)).is_ok());
        assert!(check_dimension("test", 4, &[entry]).is_err());
    }
}
