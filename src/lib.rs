//! campus-query - 문서 기반 학생 질의응답 RAG 엔진
//!
//! 업로드된 문서를 청크 단위로 임베딩하여 벡터 인덱스에 저장하고,
//! 대화형 질문을 독립 질문으로 재작성한 뒤 검색된 컨텍스트로 답변을 생성합니다.
//!
//! - 수집: 추출 → 청킹 → 배치 임베딩 → upsert
//! - 질의: 재작성 → 컨텍스트 조립 → 대체 정책 → 답변 생성 (세션 메모리 유지)

pub mod chat;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;

// Re-exports
pub use chat::{
    CampusQueryEngine, Capability, ContextAssembler, FallbackPolicy, ModelProfile, QueryRewriter,
    ResponseGenerator, Role, SessionGuard, SessionMemory, Turn, DEFAULT_FALLBACK_MESSAGE,
};
pub use config::{ChatBackend, EngineConfig};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::{
    ConfigError, EmbeddingServiceError, EngineError, GenerationError, IndexError, IngestionError,
    IngestionStep,
};
pub use extractor::{extract_text, Document, MediaType};
pub use knowledge::{
    ChunkConfig, FileStatus, InMemoryVectorIndex, IngestionPipeline, IngestionReport,
    IngestionState, LanceVectorIndex, RetrievalMatch, TextChunker, VectorEntry, VectorIndex,
};
pub use llm::{ChatModel, ChatRequest, GeminiChat, OpenAiChat};
