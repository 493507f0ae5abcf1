use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State},
    response::IntoResponse,
};
use tracing::{debug, info};

use crate::{
    api::{app_state::AppState, dto::chat_dto::*},
    error::AppError,
    security::middleware::Visitor,
    services::chat::WELCOME_MESSAGE,
};

pub async fn start() -> impl IntoResponse {
    Json(ChatResponse {
        response: WELCOME_MESSAGE.to_string(),
    })
}

/// The body is read raw so the quota gate runs even for unparsable requests.
pub async fn chat(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request = ChatRequest::from_body(&body);
    debug!("Chat request for session {}", visitor.session_id);

    let reply = state
        .chat_service
        .chat(
            &visitor.session_id,
            visitor.is_authenticated(),
            request.message(),
        )
        .await?;

    Ok(Json(ChatResponse {
        response: reply.text,
    }))
}

pub async fn get_session_state(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
) -> impl IntoResponse {
    let summary = state
        .chat_service
        .summary(&visitor.session_id, visitor.is_authenticated())
        .await;

    Json(SessionStateResponse {
        session_id: visitor.session_id,
        summary,
    })
}

pub async fn reload_intents(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
) -> Result<impl IntoResponse, AppError> {
    let Some(identity) = &visitor.identity else {
        return Err(AppError::Authorization(
            "Reloading intents requires an authenticated caller".to_string(),
        ));
    };

    let catalog = state.catalog.reload().await;
    info!(
        "Intent catalog reloaded by {}: {} intents",
        identity.subject,
        catalog.len()
    );

    Ok(Json(ReloadResponse {
        intents: catalog.len(),
        tags: catalog.tags().into_iter().map(str::to_string).collect(),
    }))
}
