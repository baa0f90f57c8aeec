//! 임베딩 모듈 - Gemini API를 통한 텍스트 벡터화
//!
//! 청크(문서)와 질의를 고정 차원 벡터로 변환합니다.
//! 원격 호출 실패는 [`EmbeddingServiceError`]로 전파되며, 재시도나 영벡터 대체는 하지 않습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::from_env()?;
//! let vector = embedder.embed("When do exams start?").await?;
//! let vectors = embedder.embed_batch(&chunks, 5).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingServiceError;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 질의 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError>;

    /// 문서 청크 임베딩 (기본 구현: `embed`)
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        self.embed(text).await
    }

    /// 배치 임베딩
    ///
    /// 동시 요청을 `max_concurrency`개로 제한하고, 초과분은 대기합니다.
    /// 출력 순서는 입력 순서와 같습니다.
    async fn embed_batch(
        &self,
        texts: &[String],
        max_concurrency: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        let futures: Vec<_> = texts.iter().map(|text| self.embed_document(text)).collect();
        stream::iter(futures)
            .buffered(max_concurrency.max(1))
            .try_collect()
            .await
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini API 기본 URL
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 기본 임베딩 모델 (MRL 지원)
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Gemini 임베딩 작업 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

impl TaskType {
    fn as_str(&self) -> &'static str {
        match self {
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug, Clone)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    model: String,
    base_url: String,
    dimension: usize,
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성 (기본 모델, 768차원)
    pub fn new(api_key: String) -> Result<Self, EmbeddingServiceError> {
        Self::with_model(api_key, DEFAULT_EMBEDDING_MODEL, DEFAULT_DIMENSION)
    }

    /// 모델과 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `model` - 임베딩 모델 이름
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    pub fn with_model(
        api_key: String,
        model: &str,
        dimension: usize,
    ) -> Result<Self, EmbeddingServiceError> {
        // 유효한 차원 확인
        if ![768, 1536, 3072].contains(&dimension) {
            return Err(EmbeddingServiceError::new(
                model,
                format!("Invalid dimension: {}. Must be 768, 1536, or 3072", dimension),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmbeddingServiceError::new(model, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            model: model.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            dimension,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    ///
    /// 우선순위: GEMINI_API_KEY > GOOGLE_AI_API_KEY
    pub fn from_env() -> Result<Self, EmbeddingServiceError> {
        let api_key = get_api_key()
            .ok_or_else(|| EmbeddingServiceError::new(DEFAULT_EMBEDDING_MODEL, "API key not found"))?;
        Self::new(api_key)
    }

    /// API 기본 URL 변경 (프록시, 테스트 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn error(&self, message: impl Into<String>) -> EmbeddingServiceError {
        EmbeddingServiceError::new(self.model.clone(), message)
    }

    /// embedContent 호출 (재시도 없음)
    async fn request(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>, EmbeddingServiceError> {
        if text.trim().is_empty() {
            return Err(self.error("Refusing to embed empty text"));
        }

        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task_type.as_str().to_string(),
            output_dimensionality: Some(self.dimension),
        };

        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(model = %self.model, error = %e, "embedding request failed");
                self.error(format!("Failed to send embedding request: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.error(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::error!(model = %self.model, %status, "embedding request rejected");
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(self.error(format!(
                    "Gemini API error ({}): {}",
                    error.error.status, error.error.message
                )));
            }
            return Err(self.error(format!("Gemini API error ({}): {}", status, body)));
        }

        let embed_response: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| self.error(format!("Failed to parse embedding response: {}", e)))?;

        let values = embed_response.embedding.values;
        if values.len() != self.dimension {
            return Err(self.error(format!(
                "Expected {} dimensions, got {}",
                self.dimension,
                values.len()
            )));
        }

        tracing::debug!(model = %self.model, text_len = text.len(), "embedded text");
        Ok(values)
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
pub(crate) struct GeminiError {
    pub(crate) error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiErrorDetail {
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        self.request(text, TaskType::RetrievalQuery).await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        self.request(text, TaskType::RetrievalDocument).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Option<String> {
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .iter()
        .find_map(|name| match std::env::var(name) {
            Ok(key) if !key.is_empty() => {
                tracing::debug!("Using API key from {}", name);
                Some(key)
            }
            _ => None,
        })
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    get_api_key().is_some()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> GeminiEmbedding {
        GeminiEmbedding::new("fake_key".to_string())
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn test_invalid_dimension() {
        let result = GeminiEmbedding::with_model("fake_key".to_string(), DEFAULT_EMBEDDING_MODEL, 999);
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("Invalid dimension"));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in [768, 1536, 3072] {
            let result = GeminiEmbedding::with_model("fake_key".to_string(), DEFAULT_EMBEDDING_MODEL, dim);
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_embed_query_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-embedding-001:embedContent"))
            .and(header("x-goog-api-key", "fake_key"))
            .and(body_partial_json(serde_json::json!({"taskType": "RETRIEVAL_QUERY"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": {"values": vec![0.5f32; DEFAULT_DIMENSION]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = embedder(&server).embed("when do exams start?").await.unwrap();
        assert_eq!(vector.len(), DEFAULT_DIMENSION);
    }

    #[tokio::test]
    async fn test_embed_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = embedder(&server).embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": {"values": [0.1, 0.2]}
            })))
            .mount(&server)
            .await;

        assert!(embedder(&server).embed_document("chunk").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(embedder(&server).embed("   ").await.is_err());
    }

    /// 동시 실행 수를 기록하는 테스트용 프로바이더
    struct CountingEmbedder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_embed_batch_bounded_and_ordered() {
        let embedder = Arc::new(CountingEmbedder {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let texts: Vec<String> = (1..=20).map(|n| "x".repeat(n)).collect();

        let vectors = embedder.embed_batch(&texts, 3).await.unwrap();

        let lens: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        let expected: Vec<f32> = (1..=20).map(|n| n as f32).collect();
        assert_eq!(lens, expected);
        assert!(embedder.peak.load(Ordering::SeqCst) <= 3);
    }
}
