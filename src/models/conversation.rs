use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the unauthenticated quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaStatus {
    /// Authenticated visitor: no counter kept or consulted.
    Bypassed,
    /// Counter after this request, and whether it is now over the limit.
    Counted { count: u32, exceeded: bool },
}

impl QuotaStatus {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, QuotaStatus::Counted { exceeded: true, .. })
    }
}

/// 会话对话状态
///
/// One per visitor session. Only the turn orchestrator (name) and the quota
/// gate (counter) mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    remembered_name: Option<String>,
    unauthenticated_query_count: u32,
    authenticated: bool,
    last_active_at: DateTime<Utc>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    /// 创建新状态
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            remembered_name: None,
            unauthenticated_query_count: 0,
            authenticated: false,
            last_active_at: now,
        }
    }

    pub fn remembered_name(&self) -> Option<&str> {
        self.remembered_name.as_deref()
    }

    pub fn unauthenticated_query_count(&self) -> u32 {
        self.unauthenticated_query_count
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Record whether the visitor currently presents a verified identity.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Store the name unless one is already remembered. Returns true if stored.
    pub fn remember_name(&mut self, name: &str) -> bool {
        if self.remembered_name.is_some() || name.is_empty() {
            return false;
        }
        self.remembered_name = Some(name.to_string());
        true
    }

    /// Count one query against the unauthenticated allowance.
    pub fn increment_and_check_quota(&mut self, limit: u32) -> QuotaStatus {
        if self.authenticated {
            return QuotaStatus::Bypassed;
        }
        self.unauthenticated_query_count = self.unauthenticated_query_count.saturating_add(1);
        QuotaStatus::Counted {
            count: self.unauthenticated_query_count,
            exceeded: self.unauthenticated_query_count > limit,
        }
    }

    /// Queries left before the gate closes; `None` for authenticated visitors.
    pub fn remaining_queries(&self, limit: u32) -> Option<u32> {
        (!self.authenticated).then(|| limit.saturating_sub(self.unauthenticated_query_count))
    }

    /// 更新最后活跃时间
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active_at > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name_wins() {
        let mut state = ConversationState::new();
        assert!(state.remember_name("Alice"));
        assert!(!state.remember_name("Bob"));
        assert_eq!(state.remembered_name(), Some("Alice"));
    }

    #[test]
    fn test_empty_name_is_ignored() {
        let mut state = ConversationState::new();
        assert!(!state.remember_name(""));
        assert!(state.remembered_name().is_none());
    }

    #[test]
    fn test_quota_exceeded_on_eleventh_query() {
        let mut state = ConversationState::new();
        for expected in 1..=10 {
            assert_eq!(
                state.increment_and_check_quota(10),
                QuotaStatus::Counted {
                    count: expected,
                    exceeded: false
                }
            );
        }
        let status = state.increment_and_check_quota(10);
        assert!(status.is_exceeded());
        assert_eq!(state.unauthenticated_query_count(), 11);
    }

    #[test]
    fn test_authenticated_visitor_bypasses_counter() {
        let mut state = ConversationState::new();
        state.set_authenticated(true);
        for _ in 0..50 {
            assert_eq!(state.increment_and_check_quota(10), QuotaStatus::Bypassed);
        }
        assert_eq!(state.unauthenticated_query_count(), 0);
        assert_eq!(state.remaining_queries(10), None);
    }

    #[test]
    fn test_remaining_queries_saturates() {
        let mut state = ConversationState::new();
        assert_eq!(state.remaining_queries(10), Some(10));
        for _ in 0..12 {
            state.increment_and_check_quota(10);
        }
        assert_eq!(state.remaining_queries(10), Some(0));
    }

    #[test]
    fn test_idle_detection() {
        let state = ConversationState::new();
        let later = state.last_active_at() + Duration::hours(2);
        assert!(state.is_idle(later, Duration::hours(1)));
        assert!(!state.is_idle(later, Duration::hours(3)));
    }
}
