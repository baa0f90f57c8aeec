//! Ingestion Pipeline - 문서 → 청크 → 임베딩 → 인덱스
//!
//! 문서별 상태 기계:
//! `received → chunked → embedded → indexed` (성공) 또는 비종료 상태 어디서든 `→ failed`.
//! 부분 upsert는 롤백하지 않으며, 같은 ID로 재수집하면 덮어씁니다.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chunker::TextChunker;
use super::vector::{EntryMetadata, VectorEntry, VectorIndex};
use crate::embedding::EmbeddingProvider;
use crate::error::{IngestionError, IngestionStep};
use crate::extractor::{extract_text, Document};

// ============================================================================
// State Machine
// ============================================================================

/// 문서 수집 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionState {
    Received,
    Chunked,
    Embedded,
    Indexed,
    Failed,
}

impl IngestionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionState::Indexed | IngestionState::Failed)
    }

    /// 허용된 전이인지
    pub fn can_transition_to(&self, next: IngestionState) -> bool {
        use IngestionState::*;
        match (self, next) {
            (Received, Chunked) | (Chunked, Embedded) | (Embedded, Indexed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// 전이 (허용되지 않으면 `Transition` 단계 에러)
    pub fn transition(self, document_id: &str, next: IngestionState) -> Result<Self, IngestionError> {
        if !self.can_transition_to(next) {
            return Err(IngestionError::other(
                document_id,
                IngestionStep::Transition,
                format!("invalid transition {} -> {}", self, next),
            ));
        }
        tracing::debug!(document_id, from = %self, to = %next, "Ingestion state changed");
        Ok(next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionState::Received => "received",
            IngestionState::Chunked => "chunked",
            IngestionState::Embedded => "embedded",
            IngestionState::Indexed => "indexed",
            IngestionState::Failed => "failed",
        }
    }
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 외부 파일 저장소의 상태 표기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl FileStatus {
    /// 수집 상태 → 파일 상태
    pub fn from_ingestion(state: IngestionState) -> Self {
        match state {
            IngestionState::Received => FileStatus::Uploaded,
            IngestionState::Chunked | IngestionState::Embedded => FileStatus::Processing,
            IngestionState::Indexed => FileStatus::Ready,
            IngestionState::Failed => FileStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Ready => "ready",
            FileStatus::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(FileStatus::Uploaded),
            "processing" => Ok(FileStatus::Processing),
            "ready" => Ok(FileStatus::Ready),
            "error" => Ok(FileStatus::Error),
            other => Err(format!("unknown file status: {}", other)),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// 수집 결과
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub document_id: String,
    pub chunk_count: usize,
    pub state: IngestionState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionReport {
    pub fn file_status(&self) -> FileStatus {
        FileStatus::from_ingestion(self.state)
    }
}

// ============================================================================
// IngestionPipeline
// ============================================================================

/// 수집 파이프라인
#[derive(Clone)]
pub struct IngestionPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    max_concurrency: usize,
    upsert_batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            max_concurrency: 5,
            upsert_batch_size: 100,
        }
    }

    /// 임베딩 동시 요청 수
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_upsert_batch_size(mut self, batch_size: usize) -> Self {
        self.upsert_batch_size = batch_size.max(1);
        self
    }

    /// 문서 수집 (텍스트 추출 포함)
    pub async fn ingest(
        &self,
        document_id: &str,
        document: &Document,
    ) -> Result<IngestionReport, IngestionError> {
        let text = extract_text(document).await.map_err(|e| {
            tracing::error!(document_id, error = %e, "Text extraction failed");
            IngestionError::other(document_id, IngestionStep::Extract, format!("{:#}", e))
        })?;

        self.ingest_text(document_id, &text).await
    }

    /// 추출된 텍스트 수집
    pub async fn ingest_text(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<IngestionReport, IngestionError> {
        let started_at = Utc::now();
        let mut state = IngestionState::Received;

        match self.run(document_id, text, &mut state).await {
            Ok(chunk_count) => {
                tracing::info!(document_id, chunk_count, "Indexed document");
                Ok(IngestionReport {
                    document_id: document_id.to_string(),
                    chunk_count,
                    state,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(err) => {
                if let Ok(failed) = state.transition(document_id, IngestionState::Failed) {
                    tracing::warn!(document_id, state = %failed, step = %err.step, "Ingestion failed");
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        document_id: &str,
        text: &str,
        state: &mut IngestionState,
    ) -> Result<usize, IngestionError> {
        // 1. 청킹 (공백뿐인 문서는 청크 0개)
        let chunks = if text.trim().is_empty() {
            tracing::warn!(document_id, "Document has no text; nothing to index");
            vec![]
        } else {
            self.chunker.split(text)
        };
        *state = state.transition(document_id, IngestionState::Chunked)?;
        tracing::debug!(document_id, chunk_count = chunks.len(), "Chunked document");

        // 2. 임베딩 (입력 순서 유지)
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            vec![]
        } else {
            self.embedder
                .embed_batch(&texts, self.max_concurrency)
                .await
                .map_err(|e| {
                    tracing::error!(document_id, error = %e, "Embedding failed during ingestion");
                    IngestionError::new(document_id, IngestionStep::Embed, e)
                })?
        };

        if vectors.len() != chunks.len() {
            return Err(IngestionError::other(
                document_id,
                IngestionStep::Embed,
                format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
            ));
        }
        *state = state.transition(document_id, IngestionState::Embedded)?;

        // 3. 인덱스 upsert (배치 단위, 롤백 없음)
        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorEntry {
                id: VectorEntry::chunk_id(document_id, chunk.seq),
                vector,
                metadata: EntryMetadata {
                    text: chunk.text,
                    source_doc_id: document_id.to_string(),
                    chunk_seq: chunk.seq,
                },
            })
            .collect();

        for batch in entries.chunks(self.upsert_batch_size) {
            self.index.upsert(batch).await.map_err(|e| {
                tracing::error!(document_id, error = %e, "Upsert failed during ingestion");
                IngestionError::new(document_id, IngestionStep::Index, e)
            })?;
        }
        *state = state.transition(document_id, IngestionState::Indexed)?;

        Ok(entries.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingServiceError;
    use crate::knowledge::chunker::ChunkConfig;
    use crate::knowledge::InMemoryVectorIndex;
    use async_trait::async_trait;

    /// 글자 빈도 기반 테스트 임베딩
    struct LetterEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
            if self.fail {
                return Err(EmbeddingServiceError::new("letters", "service unavailable"));
            }
            let mut v = vec![0.0; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            v[0] += 0.001;
            Ok(v)
        }

        fn dimension(&self) -> usize {
            26
        }

        fn name(&self) -> &str {
            "letters"
        }
    }

    fn pipeline(fail: bool, index: Arc<InMemoryVectorIndex>) -> IngestionPipeline {
        let chunker = TextChunker::new(ChunkConfig {
            chunk_size: 20,
            chunk_overlap: 5,
        })
        .unwrap();
        IngestionPipeline::new(chunker, Arc::new(LetterEmbedder { fail }), index).with_upsert_batch_size(2)
    }

    #[test]
    fn test_transition_table() {
        use IngestionState::*;
        assert!(Received.can_transition_to(Chunked));
        assert!(Chunked.can_transition_to(Embedded));
        assert!(Embedded.can_transition_to(Indexed));
        assert!(Embedded.can_transition_to(Failed));
        assert!(!Received.can_transition_to(Indexed));
        assert!(!Indexed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Received));

        let err = Indexed.transition("d", Chunked).unwrap_err();
        assert_eq!(err.step, IngestionStep::Transition);
    }

    #[test]
    fn test_file_status_mapping() {
        assert_eq!(FileStatus::from_ingestion(IngestionState::Received), FileStatus::Uploaded);
        assert_eq!(FileStatus::from_ingestion(IngestionState::Embedded), FileStatus::Processing);
        assert_eq!(FileStatus::from_ingestion(IngestionState::Indexed), FileStatus::Ready);
        assert_eq!(FileStatus::from_ingestion(IngestionState::Failed), FileStatus::Error);

        assert_eq!("ready".parse::<FileStatus>(), Ok(FileStatus::Ready));
        assert!("processed".parse::<FileStatus>().is_err());
    }

    #[tokio::test]
    async fn test_ingest_text_indexes_all_chunks() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let text = "Exams start on 12 May 2025. Results follow in June.";

        let report = pipeline(false, index.clone()).ingest_text("notice-1", text).await.unwrap();

        assert_eq!(report.state, IngestionState::Indexed);
        assert_eq!(report.file_status(), FileStatus::Ready);
        assert!(report.chunk_count > 1);
        assert_eq!(index.count().await.unwrap(), report.chunk_count);

        let hits = index.query(&LetterEmbedder { fail: false }.embed(text).await.unwrap(), 50).await.unwrap();
        assert!(hits.iter().all(|h| h.source_doc_id == "notice-1"));
        assert!(hits.iter().any(|h| h.id == "notice-1#0"));
    }

    #[tokio::test]
    async fn test_reingestion_is_idempotent() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let p = pipeline(false, index.clone());
        let text = "Library hours are 9 AM to 8 PM on weekdays.";

        p.ingest_text("lib", text).await.unwrap();
        let first = index.count().await.unwrap();
        p.ingest_text("lib", text).await.unwrap();

        assert_eq!(index.count().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_embedding_failure_names_step() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let err = pipeline(true, index.clone())
            .ingest_text("d", "some text to index")
            .await
            .unwrap_err();

        assert_eq!(err.step, IngestionStep::Embed);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_document_indexes_nothing() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let report = pipeline(false, index.clone()).ingest_text("blank", "  \n ").await.unwrap();
        assert_eq!(report.chunk_count, 0);
        assert_eq!(report.state, IngestionState::Indexed);
    }

    #[tokio::test]
    async fn test_extraction_failure_names_step() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let doc = Document::new(vec![0xff, 0xfe], crate::extractor::MediaType::PlainText);
        let err = pipeline(false, index).ingest("bad", &doc).await.unwrap_err();
        assert_eq!(err.step, IngestionStep::Extract);
    }
}
