//! 에러 타입 - RAG 엔진 에러 분류
//!
//! 각 단계(임베딩, 벡터 인덱스, 생성, 수집)별로 타입이 있는 에러를 제공합니다.
//! 어떤 단계에서도 자동 재시도는 하지 않습니다.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Stage Errors
// ============================================================================

/// 임베딩 서비스 에러 (백엔드 연결 실패 또는 입력 거부)
#[derive(Debug, Error)]
#[error("Embedding service error ({provider}): {message}")]
pub struct EmbeddingServiceError {
    pub provider: String,
    pub message: String,
}

impl EmbeddingServiceError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// 벡터 인덱스 에러 (연결 실패 또는 upsert/query 거부)
#[derive(Debug, Error)]
#[error("Vector index error ({backend}): {message}")]
pub struct IndexError {
    pub backend: String,
    pub message: String,
}

impl IndexError {
    pub fn new(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

/// 생성 에러 (LLM 호출 실패 또는 거부)
#[derive(Debug, Error)]
#[error("Generation error ({model}): {message}")]
pub struct GenerationError {
    pub model: String,
    pub message: String,
}

impl GenerationError {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// 수집 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStep {
    /// 바이트 → 텍스트 추출
    Extract,
    /// 청크 임베딩
    Embed,
    /// 벡터 인덱스 upsert
    Index,
    /// 상태 전이 검증
    Transition,
}

impl fmt::Display for IngestionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestionStep::Extract => "extract",
            IngestionStep::Embed => "embed",
            IngestionStep::Index => "index",
            IngestionStep::Transition => "transition",
        };
        f.write_str(name)
    }
}

/// 수집 실패 원인
#[derive(Debug, Error)]
pub enum IngestionCause {
    #[error(transparent)]
    Embedding(#[from] EmbeddingServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("{0}")]
    Other(String),
}

/// 수집 에러 (실패한 단계 포함)
#[derive(Debug, Error)]
#[error("Ingestion of '{document_id}' failed at {step} step: {cause}")]
pub struct IngestionError {
    pub document_id: String,
    pub step: IngestionStep,
    #[source]
    pub cause: IngestionCause,
}

impl IngestionError {
    pub fn new(
        document_id: impl Into<String>,
        step: IngestionStep,
        cause: impl Into<IngestionCause>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            step,
            cause: cause.into(),
        }
    }

    pub fn other(document_id: impl Into<String>, step: IngestionStep, message: impl Into<String>) -> Self {
        Self::new(document_id, step, IngestionCause::Other(message.into()))
    }
}

// ============================================================================
// Engine / Config
// ============================================================================

/// 설정 검증 에러
#[derive(Debug, Error)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

/// 질의 파이프라인 에러 (`answer()` 반환값)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// 컨텍스트 조립 단계 에러 (임베딩 또는 인덱스)
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<RetrievalError> for EngineError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Embedding(e) => EngineError::Embedding(e),
            RetrievalError::Index(e) => EngineError::Index(e),
        }
    }
}
