//! Knowledge 모듈 - 문서 수집 및 벡터 인덱스
//!
//! - Chunker: 고정 크기 오버랩 텍스트 분할
//! - Vector: 벡터 인덱스 트레이트 (in-memory / LanceDB)
//! - Ingest: 청킹 → 임베딩 → upsert 파이프라인과 상태 기계

mod chunker;
mod ingest;
mod lance;
mod memory;
mod vector;

// Re-exports
pub use chunker::{reassemble, Chunk, ChunkConfig, TextChunker};
pub use ingest::{FileStatus, IngestionPipeline, IngestionReport, IngestionState};
pub use lance::LanceVectorIndex;
pub use memory::InMemoryVectorIndex;
pub use vector::{
    cosine_similarity, EntryMetadata, RetrievalMatch, VectorEntry, VectorIndex, DEFAULT_TOP_K,
};
