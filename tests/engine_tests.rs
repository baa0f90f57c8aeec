//! 엔진 통합 테스트
//!
//! 단어 해시 임베딩과 스크립트 채팅 모델로 수집/질의 파이프라인 전체를 검증합니다.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use campus_query::{
    CampusQueryEngine, ChatModel, ChatRequest, Document, EmbeddingProvider, EmbeddingServiceError,
    EngineConfig, EngineError, GenerationError, InMemoryVectorIndex, Role, Turn, VectorIndex,
    DEFAULT_FALLBACK_MESSAGE,
};

const DIM: usize = 64;
const REWRITE_MODEL: &str = "fake-rewrite";
const GENERATE_MODEL: &str = "fake-generate";

// ============================================================================
// Fakes
// ============================================================================

/// 단어 해시 기반 bag-of-words 임베딩
#[derive(Default)]
struct HashingEmbedder {
    fail: AtomicBool,
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingServiceError::new("hashing", "service unavailable"));
        }

        let mut vector = vec![0.0f32; DIM];
        vector[0] = 0.001;
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            vector[1 + (hash as usize) % (DIM - 1)] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// 스크립트 채팅 모델
///
/// - 재작성: 기록이 있으면 마지막 사용자 발화를 질문에 덧붙임
/// - 생성: 컨텍스트 첫 줄을 인용
#[derive(Default)]
struct ScriptedChat {
    fail_rewrite: AtomicBool,
    fail_generate: AtomicBool,
    rewrite_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    rewrites: Mutex<Vec<String>>,
    generate_prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, model: &str, request: &ChatRequest) -> Result<String, GenerationError> {
        // 동시 요청이 섞일 여지를 줌
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (question, history) = request
            .messages
            .split_last()
            .ok_or_else(|| GenerationError::new(model, "no messages"))?;

        match model {
            REWRITE_MODEL => {
                self.rewrite_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_rewrite.load(Ordering::SeqCst) {
                    return Err(GenerationError::new(model, "rate limited"));
                }
                let rewritten = match history.iter().rev().find(|t| t.role == Role::User) {
                    Some(previous) => format!("{} (about: {})", question.content, previous.content),
                    None => question.content.clone(),
                };
                self.rewrites.lock().unwrap().push(rewritten.clone());
                Ok(rewritten)
            }
            GENERATE_MODEL => {
                self.generate_calls.fetch_add(1, Ordering::SeqCst);
                self.generate_prompts.lock().unwrap().push(request.system.clone());
                if self.fail_generate.load(Ordering::SeqCst) {
                    return Err(GenerationError::new(model, "model overloaded"));
                }
                let context = request.system.split("Context:\n").nth(1).unwrap_or_default();
                let first = context.lines().next().unwrap_or_default();
                Ok(format!("Answer to '{}': {}", question.content, first))
            }
            other => Err(GenerationError::new(other, "unknown model")),
        }
    }

    fn backend(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    engine: CampusQueryEngine,
    embedder: Arc<HashingEmbedder>,
    chat: Arc<ScriptedChat>,
    index: Arc<InMemoryVectorIndex>,
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn harness_with(mut config: EngineConfig) -> Harness {
    config.embedding_dimension = DIM;
    config.rewrite.model = REWRITE_MODEL.to_string();
    config.generate.model = GENERATE_MODEL.to_string();

    let embedder = Arc::new(HashingEmbedder::default());
    let chat = Arc::new(ScriptedChat::default());
    let index = Arc::new(InMemoryVectorIndex::new());

    let engine = CampusQueryEngine::builder()
        .config(config)
        .embedder(embedder.clone())
        .index(index.clone())
        .chat_model(chat.clone())
        .build()
        .unwrap();

    Harness {
        engine,
        embedder,
        chat,
        index,
    }
}

fn assert_alternating(turns: &[Turn]) {
    for (i, turn) in turns.iter().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        assert_eq!(turn.role, expected, "turn {} has wrong role", i);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_answer_grounded_in_ingested_notice() {
    let h = harness();
    h.engine
        .ingest("exam-notice", &Document::text("Exams start on 12 May 2025."))
        .await
        .unwrap();

    let answer = h.engine.answer("when do exams start?", "s1").await.unwrap();

    assert!(answer.contains("12 May 2025"));
    let prompts = h.chat.generate_prompts.lock().unwrap();
    assert!(prompts[0].contains("Exams start on 12 May 2025."));
}

#[tokio::test]
async fn test_empty_index_returns_fallback_verbatim() {
    let h = harness();

    let answer = h.engine.answer("when do exams start?", "s1").await.unwrap();

    assert_eq!(answer, DEFAULT_FALLBACK_MESSAGE);
    assert_eq!(h.chat.generate_calls.load(Ordering::SeqCst), 0);

    let turns = h.engine.sessions().get("s1").await;
    assert_eq!(
        turns,
        vec![
            Turn::user("when do exams start?"),
            Turn::assistant(DEFAULT_FALLBACK_MESSAGE)
        ]
    );
}

#[tokio::test]
async fn test_follow_up_is_rewritten_with_history() {
    let h = harness();
    h.engine
        .ingest("exam-notice", &Document::text("The exam on 12 May starts at 10 AM in Block A."))
        .await
        .unwrap();

    h.engine.answer("My exam is on 12 May.", "s1").await.unwrap();
    h.engine.answer("what time?", "s1").await.unwrap();

    let rewrites = h.chat.rewrites.lock().unwrap();
    let last = rewrites.last().unwrap();
    assert_ne!(last, "what time?");
    assert!(last.to_lowercase().contains("exam"));
}

#[tokio::test]
async fn test_sequential_answers_produce_alternating_turns() {
    let h = harness();
    h.engine
        .ingest("library", &Document::text("The library is open from 9 AM to 8 PM."))
        .await
        .unwrap();

    let questions = ["library hours?", "is it open on sunday?", "thanks"];
    for q in questions {
        h.engine.answer(q, "s1").await.unwrap();
    }

    let turns = h.engine.sessions().get("s1").await;
    assert_eq!(turns.len(), 2 * questions.len());
    assert_alternating(&turns);
    for (i, q) in questions.iter().enumerate() {
        assert_eq!(turns[2 * i].content, *q);
    }
}

#[tokio::test]
async fn test_concurrent_requests_on_one_session_are_serialized() {
    let h = harness();
    h.engine
        .ingest("fees", &Document::text("Semester fees are due by 1 June 2025."))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.engine.answer("when are fees due?", "shared"),
        h.engine.answer("how much are the fees?", "shared"),
    );
    a.unwrap();
    b.unwrap();

    let turns = h.engine.sessions().get("shared").await;
    assert_eq!(turns.len(), 4);
    assert_alternating(&turns);
    for pair in turns.chunks(2) {
        assert!(pair[1].content.starts_with(&format!("Answer to '{}'", pair[0].content)));
    }
}

#[tokio::test]
async fn test_busy_session_survives_small_session_cache() {
    let h = harness_with(EngineConfig {
        session_capacity: 1,
        ..EngineConfig::default()
    });
    h.engine
        .ingest("fees", &Document::text("Semester fees are due by 1 June 2025."))
        .await
        .unwrap();

    // shared가 처리 중인 동안 다른 세션들이 캐시를 채움
    let shared = async {
        let (a, b) = tokio::join!(
            h.engine.answer("when are fees due?", "shared"),
            h.engine.answer("how much are the fees?", "shared"),
        );
        a.unwrap();
        b.unwrap();
        h.engine.sessions().get("shared").await
    };
    let others = async {
        for id in ["visitor-1", "visitor-2", "visitor-3"] {
            h.engine.answer("where is the library?", id).await.unwrap();
        }
    };
    let (turns, ()) = tokio::join!(shared, others);

    assert_eq!(turns.len(), 4);
    assert_alternating(&turns);
    for pair in turns.chunks(2) {
        assert!(pair[1].content.starts_with(&format!("Answer to '{}'", pair[0].content)));
    }

    // 두 번째 요청은 첫 번째 교환을 기록으로 보고 재작성됨
    let rewrites = h.chat.rewrites.lock().unwrap();
    assert!(rewrites.iter().any(|r| r.contains("(about: ")));
}

#[tokio::test]
async fn test_rewrite_failure_skips_generation_and_appends_nothing() {
    let h = harness();
    h.engine
        .ingest("exam-notice", &Document::text("Exams start on 12 May 2025."))
        .await
        .unwrap();
    h.chat.fail_rewrite.store(true, Ordering::SeqCst);

    let err = h.engine.answer("when do exams start?", "s1").await.unwrap_err();

    assert!(matches!(err, EngineError::Generation(_)));
    assert_eq!(h.chat.rewrite_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.chat.generate_calls.load(Ordering::SeqCst), 0);
    assert!(h.engine.sessions().get("s1").await.is_empty());
}

#[tokio::test]
async fn test_generation_failure_appends_nothing() {
    let h = harness();
    h.engine
        .ingest("exam-notice", &Document::text("Exams start on 12 May 2025."))
        .await
        .unwrap();
    h.chat.fail_generate.store(true, Ordering::SeqCst);

    let err = h.engine.answer("when do exams start?", "s1").await.unwrap_err();

    assert!(matches!(err, EngineError::Generation(_)));
    assert!(h.engine.sessions().get("s1").await.is_empty());
}

#[tokio::test]
async fn test_embedding_failure_surfaces_typed_error() {
    let h = harness();
    h.embedder.fail.store(true, Ordering::SeqCst);

    let err = h.engine.answer("when do exams start?", "s1").await.unwrap_err();

    assert!(matches!(err, EngineError::Embedding(_)));
    assert_eq!(h.chat.generate_calls.load(Ordering::SeqCst), 0);
    assert!(h.engine.sessions().get("s1").await.is_empty());
}

#[tokio::test]
async fn test_reingestion_keeps_index_size() {
    let h = harness();
    let text = "Hostel applications open on 3 March. ".repeat(60);

    let first = h.engine.ingest_text("hostel", &text).await.unwrap();
    let size = h.index.count().await.unwrap();
    let second = h.engine.ingest_text("hostel", &text).await.unwrap();

    assert!(first.chunk_count > 1);
    assert_eq!(first.chunk_count, second.chunk_count);
    assert_eq!(h.index.count().await.unwrap(), size);
}

#[tokio::test]
async fn test_different_sessions_are_independent() {
    let h = harness();

    let (a, b) = tokio::join!(
        h.engine.answer("hello", "alice"),
        h.engine.answer("hi", "bob"),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(h.engine.sessions().get("alice").await[0].content, "hello");
    assert_eq!(h.engine.sessions().get("bob").await[0].content, "hi");
    assert_eq!(h.chat.rewrite_calls.load(Ordering::SeqCst), 2);
}
