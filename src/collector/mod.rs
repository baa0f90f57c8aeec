//! 파일 수집 모듈
//!
//! 로컬 파일 및 폴더에서 인덱싱 가능한 문서(PDF, 텍스트, 마크다운)를 모읍니다.
//! .gitignore 패턴을 존중하고, 업로드 한도(10MB)를 넘는 파일은 건너뜁니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};

use crate::extractor::{Document, MediaType};

/// 업로드 크기 한도 (10MB)
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// 문서 바이트로부터 결정적 문서 ID 생성 (`doc-` + SHA-256 앞 16자리)
///
/// 같은 파일을 다시 수집하면 같은 ID가 되어 기존 엔트리를 덮어씁니다.
pub fn derive_document_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("doc-{}", hex)
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    pub media_type: MediaType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 파일에서 CollectedFile 생성 (인덱싱 불가 형식이면 None)
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let media_type = match MediaType::from_path(&path) {
            Some(mt) if mt.is_indexable() => mt,
            _ => return Ok(None),
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            media_type,
            size: metadata.len(),
        }))
    }

    /// 파일 이름 (표시용)
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
    }

    /// 파일 읽기
    pub async fn load(&self) -> Result<Document> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", self.path))?;
        Ok(Document::new(bytes, self.media_type))
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// PDF 파일 건너뛰기
    pub skip_pdfs: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: MAX_UPLOAD_BYTES,
            skip_pdfs: false,
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 단일 파일 수집
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_file() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }

        let file = CollectedFile::from_path(abs_path)?;
        Ok(file.filter(|f| self.should_include(f)))
    }

    /// 폴더 재귀 수집
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.is_dir() {
            anyhow::bail!("Directory not found: {:?}", abs_path);
        }

        let mut files = Vec::new();

        // ignore 크레이트로 .gitignore 지원
        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) if self.should_include(&file) => files.push(file),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to collect file: {}", e),
            }
        }

        tracing::info!("Collected {} files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    /// 필터 조건 확인
    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::warn!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }

        !(self.config.skip_pdfs && file.media_type == MediaType::Pdf)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default)]
pub struct CollectionStats {
    pub total_files: usize,
    pub text_files: usize,
    pub pdf_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            match file.media_type {
                MediaType::Pdf => stats.pdf_files += 1,
                _ => stats.text_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_dir() -> TempDir {
        // 숨김 이름(.tmpXXXX)을 피함
        tempfile::Builder::new().prefix("collect").tempdir().unwrap()
    }

    #[test]
    fn test_derive_document_id_is_stable() {
        let a = derive_document_id(b"Exams start on 12 May 2025.");
        let b = derive_document_id(b"Exams start on 12 May 2025.");
        let c = derive_document_id(b"Exams start on 13 May 2025.");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("doc-"));
        assert_eq!(a.len(), "doc-".len() + 16);
    }

    #[test]
    fn test_collect_directory_filters() {
        let dir = temp_dir();
        std::fs::write(dir.path().join("notice.md"), "# Exams\nStart 12 May").unwrap();
        std::fs::write(dir.path().join("fees.txt"), "Fee deadline 1 June").unwrap();
        std::fs::write(dir.path().join("form.docx"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join("photo.png"), [0u8; 4]).unwrap();

        let files = FileCollector::with_defaults().collect_directory(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["fees.txt", "notice.md"]);

        let stats = CollectionStats::from_files(&files);
        assert_eq!(stats.text_files, 2);
        assert_eq!(stats.pdf_files, 0);
    }

    #[test]
    fn test_size_cap() {
        let dir = temp_dir();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(64)).unwrap();

        let collector = FileCollector::new(CollectorConfig {
            max_file_size: 16,
            ..Default::default()
        });
        assert!(collector.collect_file(&path).unwrap().is_none());
        assert!(FileCollector::with_defaults().collect_file(&path).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_load_document() {
        let dir = temp_dir();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let file = FileCollector::with_defaults().collect_file(&path).unwrap().unwrap();
        let doc = file.load().await.unwrap();
        assert_eq!(doc.bytes, b"hello");
        assert_eq!(doc.media_type, MediaType::PlainText);
    }
}
