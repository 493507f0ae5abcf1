//! 服务模块

pub mod catalog;
pub mod chat;
pub mod completion;
pub mod matcher;
pub mod name_extractor;
pub mod responder;
pub mod session;
pub mod turn;

pub use catalog::{CatalogLoadError, IntentCatalogLoader, IntentCatalogStore};
pub use chat::{ChatReply, ChatService, SessionSummary, WELCOME_MESSAGE, create_chat_service};
pub use completion::{
    ChatCompletionClient, CompletionClient, CompletionError, CompletionFallback, FallbackOutcome,
    FallbackReply,
};
pub use matcher::match_intent;
pub use name_extractor::extract_name;
pub use responder::{SelectionPolicy, policy_for, select_response};
pub use session::{
    InMemorySessionStore, SessionHandle, SessionStore, create_bounded_session_store,
    create_session_store, spawn_idle_sweeper,
};
pub use turn::{ResponseSource, TurnOrchestrator, TurnReply, create_turn_orchestrator};
