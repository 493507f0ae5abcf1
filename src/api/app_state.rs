use crate::config::AppConfig;
use crate::observability::AppMetrics;
use crate::security::auth::CombinedAuthenticator;
use crate::services::catalog::IntentCatalogStore;
use crate::services::chat::ChatService;
use std::sync::Arc;
use std::time::Duration;

/// Application state containing all shared services and security components
#[derive(Clone)]
pub struct AppState {
    /// Quota gate plus turn handling
    pub chat_service: Arc<ChatService>,
    /// Intent catalog, for explicit reloads
    pub catalog: Arc<IntentCatalogStore>,
    /// Authenticator for API key and JWT validation
    pub authenticator: Arc<CombinedAuthenticator>,
    /// Request counters shared with the observability router
    pub metrics: Arc<AppMetrics>,
    /// Name of the cookie carrying the session id
    pub cookie_name: Arc<str>,
    /// CORS allowed origins
    pub cors_allowed_origins: Arc<[String]>,
    /// Upper bound on one request, completion call included
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chat_service", &"Arc<ChatService>")
            .field("catalog", &self.catalog)
            .field("authenticator", &self.authenticator)
            .field("cookie_name", &self.cookie_name)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        chat_service: Arc<ChatService>,
        catalog: Arc<IntentCatalogStore>,
        authenticator: Arc<CombinedAuthenticator>,
        metrics: Arc<AppMetrics>,
        config: &AppConfig,
    ) -> Self {
        Self {
            chat_service,
            catalog,
            authenticator,
            metrics,
            cookie_name: Arc::from(config.session.cookie_name.as_str()),
            cors_allowed_origins: config.security.cors_allowed_origins.clone().into(),
            request_timeout: Duration::from_secs(config.server.request_timeout),
        }
    }
}
