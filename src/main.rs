use devchat::api::{self, app_state::AppState};
use devchat::config::loader::ConfigLoader;
use devchat::observability::{
    AppMetrics, ObservabilityState, create_observability_router, init_tracing,
};
use devchat::security::auth::CombinedAuthenticator;
use devchat::services::{
    CompletionFallback, IntentCatalogStore, create_bounded_session_store, create_chat_service,
    create_turn_orchestrator, spawn_idle_sweeper,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal.
    let dotenv = dotenvy::dotenv();

    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;

    let _log_guard = init_tracing(&config.logging)?;
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }
    info!(
        "Starting {} ({} environment)",
        config.app_name, config.environment
    );

    let metrics = Arc::new(AppMetrics::default());

    let catalog = Arc::new(IntentCatalogStore::from_config(&config.intents));
    if config.intents.reload_each_turn {
        info!("Intent catalog is re-read on every turn");
    }

    let fallback = CompletionFallback::from_config(&config.completion);
    let completion_configured = fallback.is_configured();
    if completion_configured {
        info!("Completion fallback using model {}", config.completion.model);
    }

    let sessions = create_bounded_session_store(config.session.max_sessions);
    let _sweeper = spawn_idle_sweeper(
        sessions.clone(),
        Duration::from_secs(config.session.idle_ttl_secs),
        Duration::from_secs(config.session.sweep_interval_secs.max(1)),
    );
    info!(
        "Session store initialized (idle ttl {}s, at most {} sessions)",
        config.session.idle_ttl_secs,
        config.session.max_sessions
    );

    let orchestrator = create_turn_orchestrator(catalog.clone(), fallback);
    let chat_service = Arc::new(create_chat_service(
        sessions.clone(),
        orchestrator,
        config.session.unauthenticated_query_limit,
        metrics.clone(),
    ));

    let authenticator = Arc::new(CombinedAuthenticator::from_config(&config.security));
    if config.security.api_keys.is_empty() && config.security.jwt_secret.is_empty() {
        warn!("No API keys or JWT secret configured; every visitor is anonymous");
    }

    let app_state = AppState::new(
        chat_service,
        catalog.clone(),
        authenticator,
        metrics.clone(),
        &config,
    );
    info!("Application state created");

    let observability_state = Arc::new(ObservabilityState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        metrics,
        catalog,
        sessions,
        completion_configured,
    ));
    let router = create_observability_router(observability_state).merge(api::create_router(app_state));
    info!("API router created with observability endpoints");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
