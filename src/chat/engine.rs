//! CampusQuery 엔진 - 수집 + 질의 파이프라인
//!
//! 질의 흐름 (세션 잠금을 요청 전체 동안 유지):
//! 1. 재작성 (세션 기록 읽기)
//! 2. 컨텍스트 조립 (임베딩 + 벡터 검색)
//! 3. 대체 정책 확인 (컨텍스트가 비면 생성 생략)
//! 4. 답변 생성 (세션에 질문/답변 추가)
//!
//! ```rust,ignore
//! let engine = CampusQueryEngine::from_config(&EngineConfig::from_env()?).await?;
//! engine.ingest("notice-42", &Document::text("Exams start on 12 May 2025.")).await?;
//! let answer = engine.answer("when do exams start?", "session-1").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::chat::context::ContextAssembler;
use crate::chat::fallback::FallbackPolicy;
use crate::chat::responder::ResponseGenerator;
use crate::chat::rewriter::QueryRewriter;
use crate::chat::session::SessionMemory;
use crate::config::EngineConfig;
use crate::embedding::{EmbeddingProvider, GeminiEmbedding};
use crate::error::{ConfigError, EngineError, IngestionError};
use crate::extractor::Document;
use crate::knowledge::{IngestionPipeline, IngestionReport, LanceVectorIndex, TextChunker, VectorIndex};
use crate::llm::{self, ChatModel};

// ============================================================================
// CampusQueryEngine
// ============================================================================

/// RAG 엔진
pub struct CampusQueryEngine {
    pipeline: IngestionPipeline,
    rewriter: QueryRewriter,
    assembler: ContextAssembler,
    fallback: FallbackPolicy,
    generator: ResponseGenerator,
    sessions: Arc<SessionMemory>,
    index: Arc<dyn VectorIndex>,
}

impl CampusQueryEngine {
    pub fn builder() -> CampusQueryEngineBuilder {
        CampusQueryEngineBuilder::default()
    }

    /// 설정으로 원격 프로바이더 + LanceDB 인덱스 구성
    pub async fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let api_key = crate::embedding::get_api_key()
            .context("GEMINI_API_KEY or GOOGLE_AI_API_KEY is required for embeddings")?;
        let embedder = GeminiEmbedding::with_model(api_key, &config.embedding_model, config.embedding_dimension)?
            .with_base_url(&config.gemini_base_url);

        let index = LanceVectorIndex::open(&config.lance_path(), &config.index_name, config.embedding_dimension)
            .await
            .context("Failed to open vector index")?;

        let chat_model = llm::from_config(config)?;

        let engine = Self::builder()
            .config(config.clone())
            .embedder(Arc::new(embedder))
            .index(Arc::new(index))
            .chat_model(chat_model)
            .build()?;

        Ok(engine)
    }

    /// 문서 수집
    pub async fn ingest(
        &self,
        document_id: &str,
        document: &Document,
    ) -> Result<IngestionReport, IngestionError> {
        self.pipeline.ingest(document_id, document).await
    }

    /// 추출된 텍스트 수집
    pub async fn ingest_text(&self, document_id: &str, text: &str) -> Result<IngestionReport, IngestionError> {
        self.pipeline.ingest_text(document_id, text).await
    }

    /// 질문에 답변
    ///
    /// 완전한 답변, 완전한 대체 메시지, 또는 타입이 있는 에러 중 하나를 반환합니다.
    pub async fn answer(&self, question: &str, session_id: &str) -> Result<String, EngineError> {
        // 같은 세션의 요청은 여기서 직렬화
        let mut session = self.sessions.lock(session_id).await;

        let standalone = self.rewriter.rewrite(question, session.turns()).await?;
        let context = self.assembler.assemble(&standalone).await?;

        if self.fallback.should_fallback(&context) {
            tracing::info!(session_id, "No grounding context; returning fallback message");
            let message = self.fallback.message().to_string();
            session.record_exchange(question, message.clone());
            return Ok(message);
        }

        let answer = self.generator.generate(question, &context, &mut session).await?;
        Ok(answer)
    }

    pub fn sessions(&self) -> &Arc<SessionMemory> {
        &self.sessions
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }
}

// ============================================================================
// Builder
// ============================================================================

/// 엔진 빌더
#[derive(Default)]
pub struct CampusQueryEngineBuilder {
    config: Option<EngineConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    chat_model: Option<Arc<dyn ChatModel>>,
    sessions: Option<Arc<SessionMemory>>,
}

impl CampusQueryEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// 재작성과 생성에 공통으로 쓰이는 채팅 모델
    pub fn chat_model(mut self, chat_model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(chat_model);
        self
    }

    /// 세션 저장소 공유 (기본: 설정의 용량/TTL로 새로 생성)
    pub fn sessions(mut self, sessions: Arc<SessionMemory>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn build(self) -> Result<CampusQueryEngine, ConfigError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedder = self
            .embedder
            .ok_or_else(|| ConfigError("embedding provider is required".to_string()))?;
        let index = self
            .index
            .ok_or_else(|| ConfigError("vector index is required".to_string()))?;
        let chat_model = self
            .chat_model
            .ok_or_else(|| ConfigError("chat model is required".to_string()))?;

        if embedder.dimension() != config.embedding_dimension {
            return Err(ConfigError(format!(
                "embedding provider '{}' produces {}-dimensional vectors but embedding_dimension is {}",
                embedder.name(),
                embedder.dimension(),
                config.embedding_dimension
            )));
        }

        let sessions = self.sessions.unwrap_or_else(|| {
            Arc::new(SessionMemory::new(
                config.session_capacity,
                Duration::from_secs(config.session_ttl_secs),
            ))
        });

        tracing::info!(
            embedder = embedder.name(),
            index = index.name(),
            chat_backend = chat_model.backend(),
            "Engine ready"
        );

        let pipeline = IngestionPipeline::new(TextChunker::new(config.chunk.clone())?, embedder.clone(), index.clone())
            .with_max_concurrency(config.embed_concurrency)
            .with_upsert_batch_size(config.upsert_batch_size);

        let assembler = ContextAssembler::new(embedder, index.clone())
            .with_top_k(config.top_k)
            .with_token_budget(config.context_token_budget);

        Ok(CampusQueryEngine {
            pipeline,
            rewriter: QueryRewriter::new(chat_model.clone(), config.rewrite.clone()),
            assembler,
            fallback: FallbackPolicy::new(config.fallback_message.clone()),
            generator: ResponseGenerator::new(chat_model, config.generate, config.fallback_message),
            sessions,
            index,
        })
    }
}
