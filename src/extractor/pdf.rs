//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF 바이트에서 텍스트를 추출합니다.

use anyhow::{Context, Result};

/// PDF에서 텍스트 추출
///
/// 페이지 구분(폼피드, 페이지 마커 줄)은 빈 줄 하나로 바뀌고 빈 페이지는 사라집니다.
/// 텍스트가 없으면 빈 문자열을 반환합니다.
pub fn extract(bytes: &[u8]) -> Result<String> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).context("Failed to extract text from PDF")?;

    // 텍스트가 비어있으면 경고
    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(String::new());
    }

    Ok(normalize_pages(&text))
}

/// 페이지 구분을 제거하고 페이지 본문을 빈 줄로 이어 붙임
fn normalize_pages(text: &str) -> String {
    split_pages(text).join("\n\n")
}

fn split_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    // 페이지 구분자 패턴 (예: "--- Page 1 ---")
    let page_pattern = regex::Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$");

    if let Ok(page_pattern) = page_pattern {
        let pages: Vec<String> = page_pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.trim().to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formfeeds_become_blank_lines() {
        let text = "Page 1 content\x0cPage 2 content\x0c\x0cPage 3 content";
        assert_eq!(
            normalize_pages(text),
            "Page 1 content\n\nPage 2 content\n\nPage 3 content"
        );
    }

    #[test]
    fn test_page_markers_are_dropped() {
        let text = "Circular A\n--- Page 2 ---\nCircular B";
        assert_eq!(normalize_pages(text), "Circular A\n\nCircular B");
    }

    #[test]
    fn test_text_without_breaks_is_trimmed() {
        assert_eq!(
            normalize_pages("  Just some text without page breaks "),
            "Just some text without page breaks"
        );
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        assert!(extract(b"not a pdf").is_err());
    }
}
