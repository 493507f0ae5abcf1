//! 会话服务
//!
//! 提供访客会话状态的创建、串行化访问和过期清理。
//!
//! Each session's state sits behind its own async mutex, so turns from one
//! visitor run one at a time while different visitors never contend.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::conversation::ConversationState;

/// Handle to one session's state.
pub type SessionHandle = Arc<Mutex<ConversationState>>;

/// 会话存储 trait
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the session, creating empty state on first use.
    async fn session(&self, session_id: &str) -> SessionHandle;

    /// Get the session only if it already exists.
    async fn find(&self, session_id: &str) -> Option<SessionHandle>;

    /// Drop sessions idle for longer than `ttl`. Returns how many were removed.
    async fn purge_idle(&self, ttl: Duration) -> usize;

    /// 会话数量
    async fn count(&self) -> usize;
}

/// Session cap used when none is configured.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// In-process session store.
///
/// The session count is soft-capped: creating a session in a full store evicts
/// the least recently active session not held by an in-flight turn.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionHandle>,
    max_sessions: usize,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_max_sessions(DEFAULT_MAX_SESSIONS)
    }

    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let state = entry.value().try_lock().ok()?;
                Some((entry.key().clone(), state.last_active_at()))
            })
            .min_by_key(|(_, last_active_at)| *last_active_at)
            .map(|(id, _)| id);

        if let Some(id) = oldest {
            debug!("Session store full, evicting session {}", id);
            self.sessions.remove(&id);
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.find(session_id).await {
            return handle;
        }
        if self.sessions.len() >= self.max_sessions {
            self.evict_least_recent();
        }

        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!("Creating conversation state for session {}", session_id);
                Arc::new(Mutex::new(ConversationState::new()))
            })
            .clone()
    }

    async fn find(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    async fn purge_idle(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let now = Utc::now();
        let before = self.sessions.len();

        // Sessions locked by an in-flight turn are active by definition.
        self.sessions.retain(|_, handle| match handle.try_lock() {
            Ok(state) => !state.is_idle(now, ttl),
            Err(_) => true,
        });

        before.saturating_sub(self.sessions.len())
    }

    async fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Periodically evict idle sessions until the runtime shuts down.
pub fn spawn_idle_sweeper(
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = store.purge_idle(ttl).await;
            if removed > 0 {
                info!("Evicted {} idle sessions", removed);
            }
        }
    })
}

/// 创建会话存储
pub fn create_session_store() -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new())
}

/// 创建有容量上限的会话存储
pub fn create_bounded_session_store(max_sessions: usize) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::with_max_sessions(max_sessions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_created_lazily_and_reused() {
        let store = InMemorySessionStore::new();
        assert!(store.find("a").await.is_none());

        let first = store.session("a").await;
        first.lock().await.remember_name("Alice");

        let again = store.session("a").await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.lock().await.remembered_name(), Some("Alice"));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.session("a").await.lock().await.remember_name("Alice");
        assert!(store.session("b").await.lock().await.remembered_name().is_none());
    }

    #[tokio::test]
    async fn test_purge_idle_keeps_fresh_sessions() {
        let store = InMemorySessionStore::new();
        store.session("fresh").await;
        assert_eq!(store.purge_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.count().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.purge_idle(Duration::from_millis(1)).await, 1);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_purge_skips_locked_sessions() {
        let store = InMemorySessionStore::new();
        let handle = store.session("busy").await;
        let _guard = handle.lock().await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.purge_idle(Duration::from_millis(1)).await, 0);
    }

    #[tokio::test]
    async fn test_full_store_evicts_least_recent_session() {
        let store = InMemorySessionStore::with_max_sessions(2);
        store.session("oldest").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.session("newer").await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        store.session("newest").await;
        assert_eq!(store.count().await, 2);
        assert!(store.find("oldest").await.is_none());
        assert!(store.find("newer").await.is_some());

        // Existing sessions never trigger eviction.
        store.session("newer").await;
        assert_eq!(store.count().await, 2);
        assert!(store.find("newest").await.is_some());
    }

    #[tokio::test]
    async fn test_eviction_skips_busy_sessions() {
        let store = InMemorySessionStore::with_max_sessions(2);
        let busy = store.session("busy").await;
        let _guard = busy.lock().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.session("idle").await;

        store.session("new").await;
        assert!(store.find("busy").await.is_some());
        assert!(store.find("idle").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_quota_increments_are_serialized() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let handle = store.session("same").await;
                let mut state = handle.lock().await;
                state.increment_and_check_quota(10);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let handle = store.session("same").await;
        assert_eq!(handle.lock().await.unauthenticated_query_count(), 20);
    }
}
