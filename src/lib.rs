//! DevChat - 开发者问答聊天机器人
//!
//! Answers each utterance from a catalog of regex intents and falls back to an
//! external chat-completion service when nothing matches. Visitors are tracked
//! per session: the name they introduce themselves with is remembered and
//! anonymous visitors get a fixed number of queries.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod security;
pub mod services;
