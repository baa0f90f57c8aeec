//! Text Chunking Module
//!
//! 추출된 문서 텍스트를 고정 크기의 겹치는 청크로 분할합니다.
//! 청크 경계는 문자(char) 단위이며, 같은 입력과 설정이면 항상 같은 경계를 만듭니다.
//! (재수집 시 같은 청크 ID로 덮어쓰기 위해 결정적이어야 함)

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 인접 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    /// 설정 검증
    ///
    /// `chunk_size > 0` 이고 `chunk_overlap < chunk_size` 여야 합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// 다음 청크 시작까지의 거리
    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 문서 텍스트의 연속 구간
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 청크 순번 (0-based)
    pub seq: usize,
    /// 원본 텍스트 내 시작 위치 (문자 단위)
    pub start_offset: usize,
    /// 이전 청크와 겹치는 앞부분 길이 (문자 단위, 첫 청크는 0)
    pub overlap: usize,
    /// 청크 텍스트
    pub text: String,
}

impl Chunk {
    /// 이전 청크와 겹치지 않는 부분
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte_idx, _)) => &self.text[byte_idx..],
            None => "",
        }
    }

    /// 청크 길이 (문자 수)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// 청크들의 겹치지 않는 부분을 이어붙여 원본 텍스트 복원
pub fn reassemble(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::fresh_text).collect()
}

// ============================================================================
// TextChunker
// ============================================================================

/// 고정 크기 오버랩 청커
///
/// 길이 `chunk_size` 의 창을 `chunk_size - chunk_overlap` 만큼씩 이동시키며 자릅니다.
/// 마지막 청크만 짧을 수 있습니다.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정(1000/200)으로 생성
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 텍스트를 청크로 분할
    ///
    /// 빈 텍스트는 청크 0개를 반환합니다 (에러 아님).
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        // 문자 경계 → 바이트 위치 (마지막에 text.len() 포함)
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut chunks = Vec::with_capacity(total / self.config.step() + 1);
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(total);
            let seq = chunks.len();

            chunks.push(Chunk {
                seq,
                start_offset: start,
                overlap: if seq == 0 { 0 } else { self.config.chunk_overlap },
                text: text[bounds[start]..bounds[end]].to_string(),
            });

            if end == total {
                break;
            }
            start += self.config.step();
        }

        chunks
    }
}

// ============================================================================
// Tests
// ============================================================================
