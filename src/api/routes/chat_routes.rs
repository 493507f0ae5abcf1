//! Chat Routes
//!
//! 定义聊天相关的 API 路由。

use crate::api::handlers::chat_handler::*;
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::app_state::AppState;

/// 创建聊天路由器
pub fn create_chat_router() -> Router<AppState> {
    Router::new()
        .route("/start", get(start))
        .route("/chat", post(chat))
        .route("/session", get(get_session_state))
        .route("/admin/intents/reload", post(reload_intents))
}
