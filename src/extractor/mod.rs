//! 콘텐츠 추출 모듈
//!
//! 업로드된 문서(바이트 + 미디어 타입)에서 텍스트를 추출합니다.
//! - 텍스트/마크다운: UTF-8 디코딩
//! - PDF: pdf-extract로 텍스트 추출
//! - Word: 업로드는 허용되지만 인덱싱 불가 (추출 실패)

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

// ============================================================================
// Document
// ============================================================================

/// 미디어 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    PlainText,
    Markdown,
    /// application/msword, .docx
    Word,
}

impl MediaType {
    /// MIME 문자열로 결정
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(MediaType::Pdf),
            "text/plain" => Some(MediaType::PlainText),
            "text/markdown" => Some(MediaType::Markdown),
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(MediaType::Word)
            }
            _ => None,
        }
    }

    /// 확장자로 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(MediaType::Pdf),
            "txt" | "text" => Some(MediaType::PlainText),
            "md" | "markdown" => Some(MediaType::Markdown),
            "doc" | "docx" => Some(MediaType::Word),
            _ => None,
        }
    }

    /// 파일 경로로 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::PlainText => "text/plain",
            MediaType::Markdown => "text/markdown",
            MediaType::Word => "application/msword",
        }
    }

    /// 텍스트 추출이 가능한 타입인지
    pub fn is_indexable(&self) -> bool {
        !matches!(self, MediaType::Word)
    }
}

/// 수집 입력 문서 (청킹 이후 보관하지 않음)
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

impl Document {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self { bytes, media_type }
    }

    /// 일반 텍스트 문서
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), MediaType::PlainText)
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// 문서에서 텍스트 추출
pub async fn extract_text(document: &Document) -> Result<String> {
    match document.media_type {
        MediaType::PlainText | MediaType::Markdown => {
            String::from_utf8(document.bytes.clone()).context("Document is not valid UTF-8")
        }
        MediaType::Pdf => {
            // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
            let bytes = document.bytes.clone();
            tokio::task::spawn_blocking(move || pdf::extract(&bytes))
                .await
                .context("PDF extraction task failed")?
        }
        MediaType::Word => anyhow::bail!(
            "Word documents are not indexable ({}); upload a PDF or text version",
            document.media_type.mime()
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
