//! Chat 모듈 - 질의 파이프라인
//!
//! 재작성 → 컨텍스트 조립 → 대체 정책 → 답변 생성, 세션 메모리

pub mod context;
pub mod engine;
pub mod fallback;
pub mod profile;
pub mod responder;
pub mod rewriter;
pub mod session;

// Re-exports
pub use context::{estimate_tokens, ContextAssembler, CONTEXT_SEPARATOR};
pub use engine::{CampusQueryEngine, CampusQueryEngineBuilder};
pub use fallback::{FallbackPolicy, DEFAULT_FALLBACK_MESSAGE};
pub use profile::{Capability, ModelProfile};
pub use responder::ResponseGenerator;
pub use rewriter::QueryRewriter;
pub use session::{Role, SessionGuard, SessionMemory, Turn};
