//! Session Memory - 세션별 대화 기록
//!
//! 프로세스 전역 LRU 캐시(용량 + 유휴 TTL)에 세션을 보관합니다.
//! 세션마다 `tokio::sync::Mutex`가 있어, 같은 세션 ID의 요청은
//! 읽기부터 추가까지 전 구간이 직렬화됩니다. 다른 세션끼리는 경합하지 않습니다.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 기본 세션 용량
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;

/// 기본 유휴 TTL (1시간)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

// ============================================================================
// Turn
// ============================================================================

/// 발화 주체
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 대화 턴
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 세션 (추가만 가능)
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<Turn>,
}

// ============================================================================
// SessionGuard
// ============================================================================

/// 세션 배타 잠금
///
/// 살아있는 동안 같은 세션 ID의 다른 요청은 대기합니다.
pub struct SessionGuard {
    session_id: String,
    guard: OwnedMutexGuard<Session>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 현재까지의 턴
    pub fn turns(&self) -> &[Turn] {
        &self.guard.turns
    }

    /// 턴 추가
    pub fn push(&mut self, turn: Turn) {
        self.guard.turns.push(turn);
    }

    /// 질문/답변 쌍 추가 (user → assistant 순서)
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.guard.turns.push(Turn::user(question));
        self.guard.turns.push(Turn::assistant(answer));
        tracing::debug!(
            session_id = %self.session_id,
            turns = self.guard.turns.len(),
            "Recorded exchange"
        );
    }
}

// ============================================================================
// SessionMemory
// ============================================================================

struct SessionSlot {
    session: Arc<AsyncMutex<Session>>,
    last_access: Instant,
}

impl SessionSlot {
    /// 잠금을 쥐었거나 기다리는 요청이 없는지
    ///
    /// `Arc` 복제는 저장소 잠금 안에서만 생기므로, 여기서 1이면 사용 중인 요청이 없습니다.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.session) == 1
    }
}

/// 세션 저장소
///
/// 만료된 세션은 접근 시점에 LRU 끝에서부터 제거됩니다.
/// 사용 중인 세션은 만료나 용량 초과로 제거되지 않으며, 모든 세션이 사용 중이면
/// 일시적으로 용량을 넘길 수 있습니다.
pub struct SessionMemory {
    slots: Mutex<LruCache<String, SessionSlot>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL)
    }
}

impl SessionMemory {
    /// 용량과 유휴 TTL로 생성 (용량 0은 1로 취급)
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(LruCache::unbounded()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// 만료된 유휴 세션 제거
    fn expire(&self, slots: &mut LruCache<String, SessionSlot>, now: Instant) {
        // LRU 순서 = 접근 순서이므로 끝에서부터 만료 구간만 검사
        let expired: Vec<String> = slots
            .iter()
            .rev()
            .take_while(|(_, slot)| now.duration_since(slot.last_access) >= self.ttl)
            .filter(|(_, slot)| slot.is_idle())
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            slots.pop(&id);
            tracing::debug!(session_id = %id, "Session expired");
        }
    }

    /// 용량을 넘지 않도록 가장 오래된 유휴 세션 제거
    fn evict(&self, slots: &mut LruCache<String, SessionSlot>) {
        while slots.len() >= self.capacity {
            let victim = slots
                .iter()
                .rev()
                .find(|(_, slot)| slot.is_idle())
                .map(|(id, _)| id.clone());

            match victim {
                Some(id) => {
                    slots.pop(&id);
                    tracing::debug!(session_id = %id, "Session evicted (capacity)");
                }
                None => {
                    tracing::debug!(sessions = slots.len(), "All sessions busy; exceeding capacity");
                    break;
                }
            }
        }
    }

    /// 기존 세션 슬롯 조회
    fn get_slot(&self, session_id: &str) -> Option<Arc<AsyncMutex<Session>>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        self.expire(&mut slots, now);

        slots.get_mut(session_id).map(|slot| {
            slot.last_access = now;
            Arc::clone(&slot.session)
        })
    }

    /// 세션 슬롯 조회 (없으면 생성)
    fn get_or_create_slot(&self, session_id: &str) -> Arc<AsyncMutex<Session>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        self.expire(&mut slots, now);

        if let Some(slot) = slots.get_mut(session_id) {
            slot.last_access = now;
            return Arc::clone(&slot.session);
        }

        self.evict(&mut slots);

        let session = Arc::new(AsyncMutex::new(Session::default()));
        slots.put(
            session_id.to_string(),
            SessionSlot {
                session: Arc::clone(&session),
                last_access: now,
            },
        );
        session
    }

    /// 세션 배타 잠금 획득 (처음 보는 ID면 생성)
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let session = self.get_or_create_slot(session_id);

        SessionGuard {
            session_id: session_id.to_string(),
            guard: session.lock_owned().await,
        }
    }

    /// 턴 목록 (처음 보는 ID면 빈 목록, 생성하지 않음)
    pub async fn get(&self, session_id: &str) -> Vec<Turn> {
        match self.get_slot(session_id) {
            Some(session) => session.lock().await.turns.clone(),
            None => vec![],
        }
    }

    /// 턴 추가
    pub async fn append(&self, session_id: &str, turn: Turn) {
        self.lock(session_id).await.push(turn);
    }

    /// 보관 중인 세션 수
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
