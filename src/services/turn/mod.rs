//! 轮次服务
//!
//! Turns one utterance into one reply: remember a name, match an intent, pick a
//! response or fall back to completion, then fill in the `[name]` placeholder.
//! Quota is not enforced here; the caller gates before invoking a turn.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::models::conversation::ConversationState;
use crate::services::catalog::IntentCatalogStore;
use crate::services::completion::{CompletionFallback, FallbackOutcome};
use crate::services::matcher::match_intent;
use crate::services::name_extractor::extract_name;
use crate::services::responder::select_response;

/// Literal token replaced by the remembered name.
pub const NAME_PLACEHOLDER: &str = "[name]";

/// 回复来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseSource {
    /// Answered from the intent with this tag.
    Intent { tag: String },
    /// Answered by the completion service.
    Completion,
    /// Completion was attempted and failed.
    CompletionFailed,
    /// Completion is not configured.
    CompletionUnavailable,
}

impl From<FallbackOutcome> for ResponseSource {
    fn from(outcome: FallbackOutcome) -> Self {
        match outcome {
            FallbackOutcome::Completed => ResponseSource::Completion,
            FallbackOutcome::Failed => ResponseSource::CompletionFailed,
            FallbackOutcome::Unavailable => ResponseSource::CompletionUnavailable,
        }
    }
}

/// Reply text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub source: ResponseSource,
}

/// 轮次编排器
#[derive(Debug, Clone)]
pub struct TurnOrchestrator {
    catalog: Arc<IntentCatalogStore>,
    fallback: CompletionFallback,
}

impl TurnOrchestrator {
    pub fn new(catalog: Arc<IntentCatalogStore>, fallback: CompletionFallback) -> Self {
        Self { catalog, fallback }
    }

    /// Produce the reply text for one utterance.
    pub async fn handle_turn(&self, state: &mut ConversationState, utterance: &str) -> String {
        self.run_turn(state, utterance).await.text
    }

    /// Same as [`handle_turn`](Self::handle_turn), also reporting the source.
    pub async fn run_turn(&self, state: &mut ConversationState, utterance: &str) -> TurnReply {
        if state.remembered_name().is_none() {
            if let Some(name) = extract_name(utterance) {
                if state.remember_name(&name) {
                    debug!("Remembered visitor name: {}", name);
                }
            }
        }

        let catalog = self.catalog.current().await;
        // ThreadRng is !Send; keep it out of scope before the next await.
        let matched = match_intent(&catalog, utterance).map(|intent| {
            let text = select_response(intent, &mut rand::thread_rng()).to_string();
            (intent.tag().to_string(), text)
        });

        let (text, source) = match matched {
            Some((tag, text)) => {
                debug!("Utterance matched intent {}", tag);
                (text, ResponseSource::Intent { tag })
            }
            None => {
                debug!("No intent matched; using completion fallback");
                let reply = self.fallback.complete(utterance).await;
                (reply.text, reply.outcome.into())
            }
        };

        let text = match state.remembered_name() {
            Some(name) => text.replace(NAME_PLACEHOLDER, name),
            None => text,
        };

        TurnReply { text, source }
    }
}

/// 创建轮次编排器
pub fn create_turn_orchestrator(
    catalog: Arc<IntentCatalogStore>,
    fallback: CompletionFallback,
) -> TurnOrchestrator {
    TurnOrchestrator::new(catalog, fallback)
}
