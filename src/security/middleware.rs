//! Security Middleware Module
//!
//! Axum middleware for security headers and visitor resolution.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::app_state::AppState;
use crate::error::AppError;
use crate::security::auth::{Credentials, Identity};

/// Upper bound on a session id taken from a cookie.
const MAX_SESSION_ID_LEN: usize = 128;

/// Who is talking: a session plus an optional verified identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor {
    pub session_id: String,
    pub identity: Option<Identity>,
}

impl Visitor {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Session id from the named cookie, if present and well-formed.
fn session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| is_valid_session_id(id))
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Resolve the session cookie and credentials into a [`Visitor`] extension.
///
/// A missing or malformed cookie gets a fresh id, sent back via `Set-Cookie`.
/// Credentials that fail verification end the request with 401.
pub async fn visitor_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let existing = session_cookie(req.headers(), &state.cookie_name);
    let minted = existing.is_none();
    let session_id = existing.unwrap_or_else(|| Uuid::new_v4().to_string());

    let credentials = Credentials::from_headers(req.headers());
    let identity = state.authenticator.resolve(&credentials).await?;
    if let Some(identity) = &identity {
        debug!(
            "Session {} authenticated as {} ({})",
            session_id, identity.subject, identity.token_type
        );
    }

    req.extensions_mut().insert(Visitor {
        session_id: session_id.clone(),
        identity,
    });

    let mut response = next.run(req).await;

    if minted {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            state.cookie_name, session_id
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Session cookie could not be encoded: {}", e),
        }
    }

    Ok(response)
}

/// Security headers middleware
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    // The browser client records speech, so the microphone stays same-origin.
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(self), camera=()"),
    );

    response
}
