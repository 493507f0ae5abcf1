//! 数据模型模块

pub mod conversation;
pub mod intent;

pub use conversation::{ConversationState, QuotaStatus};
pub use intent::{Intent, IntentCatalog, IntentDefinition, IntentError, RuleFile};
