//! 엔진 설정
//!
//! 기본값 위에 `CAMPUS_QUERY_*` 환경변수를 덮어써서 로드합니다.
//! `.env` 파일은 바이너리 진입점에서 dotenvy로 읽습니다.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chat::fallback::DEFAULT_FALLBACK_MESSAGE;
use crate::chat::profile::{Capability, ModelProfile};
use crate::embedding::{DEFAULT_DIMENSION, DEFAULT_EMBEDDING_MODEL, GEMINI_API_BASE};
use crate::error::ConfigError;
use crate::knowledge::{ChunkConfig, DEFAULT_TOP_K};
use crate::llm::openai::OPENAI_API_BASE;

/// 환경변수 접두사
pub const ENV_PREFIX: &str = "CAMPUS_QUERY_";

/// 데이터 디렉토리 경로
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".campus-query")
}

// ============================================================================
// ChatBackend
// ============================================================================

/// 채팅 모델 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackend {
    /// Gemini generateContent
    #[default]
    Gemini,
    /// OpenAI 호환 chat/completions
    OpenAi,
}

impl ChatBackend {
    pub fn default_model(&self) -> &'static str {
        match self {
            ChatBackend::Gemini => "gemini-2.0-flash",
            ChatBackend::OpenAi => "gpt-4o",
        }
    }
}

impl FromStr for ChatBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ChatBackend::Gemini),
            "openai" | "gpt" => Ok(ChatBackend::OpenAi),
            other => Err(ConfigError(format!("Unknown chat backend: {}", other))),
        }
    }
}

// ============================================================================
// EngineConfig
// ============================================================================

/// RAG 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunk: ChunkConfig,
    pub top_k: usize,
    /// 배치 임베딩 동시 요청 수
    pub embed_concurrency: usize,
    /// 한 번에 upsert할 엔트리 수
    pub upsert_batch_size: usize,
    /// 컨텍스트 토큰 예산 (0이면 제한 없음)
    pub context_token_budget: usize,
    pub session_capacity: usize,
    /// 세션 유휴 만료 시간 (초)
    pub session_ttl_secs: u64,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_backend: ChatBackend,
    pub rewrite: ModelProfile,
    pub generate: ModelProfile,
    pub fallback_message: String,
    /// 벡터 인덱스(테이블) 이름
    pub index_name: String,
    pub data_dir: PathBuf,
    pub gemini_base_url: String,
    pub openai_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let backend = ChatBackend::default();
        Self {
            chunk: ChunkConfig::default(),
            top_k: DEFAULT_TOP_K,
            embed_concurrency: 5,
            upsert_batch_size: 100,
            context_token_budget: 8000,
            session_capacity: 1024,
            session_ttl_secs: 3600,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_DIMENSION,
            chat_backend: backend,
            rewrite: ModelProfile::default_for(Capability::Rewrite, backend),
            generate: ModelProfile::default_for(Capability::Generate, backend),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            index_name: "campus-query".to_string(),
            data_dir: get_data_dir(),
            gemini_base_url: GEMINI_API_BASE.to_string(),
            openai_base_url: OPENAI_API_BASE.to_string(),
        }
    }
}

impl EngineConfig {
    /// 환경변수에서 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// 키 조회 함수로 로드 (키는 접두사 제외 이름, 예: `TOP_K`)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(backend) = get("CHAT_BACKEND") {
            let backend: ChatBackend = backend.parse()?;
            config.chat_backend = backend;
            config.rewrite = ModelProfile::default_for(Capability::Rewrite, backend);
            config.generate = ModelProfile::default_for(Capability::Generate, backend);
        }

        set_parsed(&get, "CHUNK_SIZE", &mut config.chunk.chunk_size)?;
        set_parsed(&get, "CHUNK_OVERLAP", &mut config.chunk.chunk_overlap)?;
        set_parsed(&get, "TOP_K", &mut config.top_k)?;
        set_parsed(&get, "EMBED_CONCURRENCY", &mut config.embed_concurrency)?;
        set_parsed(&get, "UPSERT_BATCH_SIZE", &mut config.upsert_batch_size)?;
        set_parsed(&get, "CONTEXT_TOKEN_BUDGET", &mut config.context_token_budget)?;
        set_parsed(&get, "SESSION_CAPACITY", &mut config.session_capacity)?;
        set_parsed(&get, "SESSION_TTL_SECS", &mut config.session_ttl_secs)?;
        set_parsed(&get, "EMBEDDING_DIMENSION", &mut config.embedding_dimension)?;
        set_parsed(&get, "TEMPERATURE", &mut config.generate.temperature)?;
        config.rewrite.temperature = config.generate.temperature;

        if let Some(model) = get("EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Some(model) = get("REWRITE_MODEL") {
            config.rewrite.model = model;
        }
        if let Some(model) = get("GENERATE_MODEL") {
            config.generate.model = model;
        }
        if let Some(message) = get("FALLBACK_MESSAGE") {
            config.fallback_message = message;
        }
        if let Some(name) = get("INDEX_NAME") {
            config.index_name = name;
        }
        if let Some(dir) = get("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            config.gemini_base_url = url;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai_base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunk.validate()?;

        let positive = [
            ("top_k", self.top_k),
            ("embed_concurrency", self.embed_concurrency),
            ("upsert_batch_size", self.upsert_batch_size),
            ("session_capacity", self.session_capacity),
            ("embedding_dimension", self.embedding_dimension),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError(format!("{} must be greater than zero", name)));
            }
        }

        if self.index_name.trim().is_empty() {
            return Err(ConfigError("index_name must not be empty".to_string()));
        }
        if self.fallback_message.trim().is_empty() {
            return Err(ConfigError("fallback_message must not be empty".to_string()));
        }
        for profile in [&self.rewrite, &self.generate] {
            if profile.model.trim().is_empty() {
                return Err(ConfigError("model name must not be empty".to_string()));
            }
        }

        Ok(())
    }

    /// LanceDB 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }
}

fn set_parsed<T, G>(get: &G, name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| ConfigError(format!("{}{}: invalid value '{}': {}", ENV_PREFIX, name, raw, e)))?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
