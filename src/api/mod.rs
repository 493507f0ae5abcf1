//! API 模块
//!
//! 提供 REST API 支持。

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use crate::api::app_state::AppState;
use crate::observability::metrics_middleware;
use crate::security::middleware::{security_headers_middleware, visitor_middleware};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// CORS for the browser client. Cookies are only allowed with explicit origins.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

pub fn create_router(app_state: AppState) -> Router {
    let metrics = app_state.metrics.clone();
    let cors = cors_layer(&app_state.cors_allowed_origins);
    let timeout = app_state.request_timeout;

    Router::new()
        .merge(routes::chat_routes::create_chat_router())
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            visitor_middleware,
        ))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
