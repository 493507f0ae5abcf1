//! 聊天服务
//!
//! Endpoint-level policy around a turn: per-session serialization, the
//! unauthenticated quota gate, request validation, then the turn itself.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::observability::AppMetrics;
use crate::services::session::SessionStore;
use crate::services::turn::{ResponseSource, TurnOrchestrator};

/// Greeting served by the start endpoint.
pub const WELCOME_MESSAGE: &str = "Hello! Welcome to DevChatbot-AI. I'm here to help you with development, programming, and AI. Press the microphone button to start talking!";

/// Rejection text for a request without a usable message.
pub const INVALID_MESSAGE: &str = "Please provide a valid 'message' key in your request.";

/// 聊天回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub source: ResponseSource,
}

/// 会话摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub remembered_name: Option<String>,
    pub query_count: u32,
    pub authenticated: bool,
    /// `None` for authenticated visitors.
    pub remaining_queries: Option<u32>,
}

/// 聊天服务
#[derive(Clone)]
pub struct ChatService {
    sessions: Arc<dyn SessionStore>,
    orchestrator: TurnOrchestrator,
    quota_limit: u32,
    metrics: Arc<AppMetrics>,
}

impl ChatService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        orchestrator: TurnOrchestrator,
        quota_limit: u32,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            sessions,
            orchestrator,
            quota_limit,
            metrics,
        }
    }

    /// Handle one chat request.
    ///
    /// The quota is counted before the message is validated, so a malformed
    /// request from an anonymous visitor still uses up one query. Name changes
    /// are committed only once the turn finishes.
    pub async fn chat(
        &self,
        session_id: &str,
        authenticated: bool,
        message: Option<&str>,
    ) -> Result<ChatReply> {
        let handle = self.sessions.session(session_id).await;
        let mut state = handle.lock().await;
        state.set_authenticated(authenticated);
        state.touch();

        let quota = state.increment_and_check_quota(self.quota_limit);
        if quota.is_exceeded() {
            info!("Session {} exceeded the unauthenticated query limit", session_id);
            self.metrics.record_quota_rejection();
            return Err(AppError::QuotaExceeded {
                limit: self.quota_limit,
            });
        }

        let utterance =
            message.ok_or_else(|| AppError::Validation(INVALID_MESSAGE.to_string()))?;

        let mut draft = state.clone();
        let reply = self.orchestrator.run_turn(&mut draft, utterance).await;
        *state = draft;

        debug!("Session {} answered via {:?}", session_id, reply.source);
        self.metrics.record_turn(&reply.source);

        Ok(ChatReply {
            text: reply.text,
            source: reply.source,
        })
    }

    /// Current state of a session; unknown sessions report fresh state.
    pub async fn summary(&self, session_id: &str, authenticated: bool) -> SessionSummary {
        let Some(handle) = self.sessions.find(session_id).await else {
            return SessionSummary {
                remembered_name: None,
                query_count: 0,
                authenticated,
                remaining_queries: (!authenticated).then_some(self.quota_limit),
            };
        };

        let mut state = handle.lock().await;
        state.set_authenticated(authenticated);
        SessionSummary {
            remembered_name: state.remembered_name().map(str::to_string),
            query_count: state.unauthenticated_query_count(),
            authenticated,
            remaining_queries: state.remaining_queries(self.quota_limit),
        }
    }
}

/// 创建聊天服务
pub fn create_chat_service(
    sessions: Arc<dyn SessionStore>,
    orchestrator: TurnOrchestrator,
    quota_limit: u32,
    metrics: Arc<AppMetrics>,
) -> ChatService {
    ChatService::new(sessions, orchestrator, quota_limit, metrics)
}
