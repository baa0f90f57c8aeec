//! In-memory Vector Index - 코사인 유사도 전수 검색
//!
//! 삽입 순서를 유지하는 `Vec` + ID 위치 맵을 `tokio::sync::RwLock`으로 보호합니다.
//! 개발/테스트 및 소규모 코퍼스용입니다.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::vector::{check_dimension, cosine_similarity, RetrievalMatch, VectorEntry, VectorIndex};
use crate::error::IndexError;

const BACKEND: &str = "in-memory";

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<VectorEntry>,
    positions: HashMap<String, usize>,
    dimension: Option<usize>,
}

/// 메모리 벡터 인덱스
///
/// 동점은 삽입 순서로 정렬됩니다 (교체된 엔트리는 원래 위치 유지).
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    inner: RwLock<Inner>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 차원을 고정하여 생성
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                dimension: Some(dimension),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize, IndexError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.write().await;

        // 첫 upsert에서 차원 고정
        let dimension = *inner.dimension.get_or_insert(entries[0].vector.len());
        check_dimension(BACKEND, dimension, entries)?;

        for entry in entries {
            match inner.positions.get(&entry.id).copied() {
                Some(pos) => inner.entries[pos] = entry.clone(),
                None => {
                    let pos = inner.entries.len();
                    inner.positions.insert(entry.id.clone(), pos);
                    inner.entries.push(entry.clone());
                }
            }
        }

        Ok(entries.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>, IndexError> {
        let inner = self.inner.read().await;

        if let Some(dimension) = inner.dimension {
            if vector.len() != dimension {
                return Err(IndexError::new(
                    BACKEND,
                    format!(
                        "query dimension {} does not match index dimension {}",
                        vector.len(),
                        dimension
                    ),
                ));
            }
        }

        let mut scored: Vec<RetrievalMatch> = inner
            .entries
            .iter()
            .map(|entry| RetrievalMatch::from_entry(entry, cosine_similarity(&entry.vector, vector)))
            .collect();

        // sort_by는 안정 정렬 → 동점은 삽입 순서
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.inner.read().await.entries.len())
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

// ============================================================================
// Tests
// ============================================================================
