//! Fallback Policy
//!
//! 근거 컨텍스트가 없으면 생성을 건너뛰고 고정 안내 메시지를 반환합니다.

/// 기본 대체 메시지 (사람 담당자 안내)
pub const DEFAULT_FALLBACK_MESSAGE: &str = "I couldn't find the details right now. Please reach out to the campus helpdesk at student_help@jssaten.ac.in for further assistance.";

/// 대체 응답 정책
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    message: String,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_MESSAGE)
    }
}

impl FallbackPolicy {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// 컨텍스트가 비었거나 공백뿐이면 true
    pub fn should_fallback(&self, context: &str) -> bool {
        context.trim().is_empty()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_fallback() {
        let policy = FallbackPolicy::default();
        assert!(policy.should_fallback(""));
        assert!(policy.should_fallback(" \n\t "));
        assert!(!policy.should_fallback("Exams start on 12 May 2025."));
        assert!(policy.message().contains("student_help@jssaten.ac.in"));
    }
}
