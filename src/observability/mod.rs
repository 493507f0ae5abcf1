//! 可观测性模块
//!
//! 提供 Prometheus 指标、结构化日志和健康检查。

use axum::{
    Json, Router,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::config::LoggingConfig;
use crate::services::catalog::IntentCatalogStore;
use crate::services::session::SessionStore;
use crate::services::turn::ResponseSource;

// ===== Simple Metrics (atomics, Prometheus text output) =====

/// 简单应用指标
#[derive(Debug, Default)]
pub struct AppMetrics {
    pub http_requests_total: AtomicU64,
    pub http_request_duration_sum: AtomicU64,
    pub sessions_active: AtomicUsize,
    pub turns_total: AtomicU64,
    pub intent_matches_total: AtomicU64,
    pub completion_calls_total: AtomicU64,
    pub completion_failures_total: AtomicU64,
    pub quota_rejections_total: AtomicU64,
    pub errors_total: AtomicU64,
}

impl AppMetrics {
    /// 记录 HTTP 请求
    pub fn record_http_request(&self, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::SeqCst);
        self.http_request_duration_sum
            .fetch_add(duration_ms, Ordering::SeqCst);
    }

    /// 记录一次对话轮次及其回复来源
    pub fn record_turn(&self, source: &ResponseSource) {
        self.turns_total.fetch_add(1, Ordering::SeqCst);
        match source {
            ResponseSource::Intent { .. } => {
                self.intent_matches_total.fetch_add(1, Ordering::SeqCst);
            }
            ResponseSource::Completion => {
                self.completion_calls_total.fetch_add(1, Ordering::SeqCst);
            }
            ResponseSource::CompletionFailed => {
                self.completion_calls_total.fetch_add(1, Ordering::SeqCst);
                self.completion_failures_total
                    .fetch_add(1, Ordering::SeqCst);
            }
            ResponseSource::CompletionUnavailable => {}
        }
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录错误
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_sessions_active(&self, count: usize) {
        self.sessions_active.store(count, Ordering::SeqCst);
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self) -> String {
        format!(
            r#"# HELP http_requests_total Total HTTP requests
# TYPE http_requests_total counter
http_requests_total {}
# HELP http_request_duration_seconds HTTP request duration in seconds
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_sum {}
http_request_duration_seconds_count {}
# HELP sessions_active Conversation sessions held in memory
# TYPE sessions_active gauge
sessions_active {}
# HELP turns_total Total chat turns answered
# TYPE turns_total counter
turns_total {}
# HELP intent_matches_total Turns answered from the intent catalog
# TYPE intent_matches_total counter
intent_matches_total {}
# HELP completion_calls_total Calls made to the completion service
# TYPE completion_calls_total counter
completion_calls_total {}
# HELP completion_failures_total Failed completion calls
# TYPE completion_failures_total counter
completion_failures_total {}
# HELP quota_rejections_total Requests rejected by the unauthenticated quota
# TYPE quota_rejections_total counter
quota_rejections_total {}
# HELP errors_total Total errors
# TYPE errors_total counter
errors_total {}
"#,
            self.http_requests_total.load(Ordering::SeqCst),
            self.http_request_duration_sum.load(Ordering::SeqCst) as f64 / 1000.0,
            self.http_requests_total.load(Ordering::SeqCst),
            self.sessions_active.load(Ordering::SeqCst),
            self.turns_total.load(Ordering::SeqCst),
            self.intent_matches_total.load(Ordering::SeqCst),
            self.completion_calls_total.load(Ordering::SeqCst),
            self.completion_failures_total.load(Ordering::SeqCst),
            self.quota_rejections_total.load(Ordering::SeqCst),
            self.errors_total.load(Ordering::SeqCst),
        )
    }
}

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<HealthCheck>,
}

/// 单个健康检查项
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
}

impl HealthCheck {
    fn new(name: &str, healthy: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: status_label(healthy).to_string(),
            message: Some(message),
        }
    }
}

fn status_label(healthy: bool) -> &'static str {
    if healthy { "healthy" } else { "unhealthy" }
}

/// 应用状态（用于健康检查）
#[derive(Clone)]
pub struct ObservabilityState {
    pub metrics: Arc<AppMetrics>,
    pub catalog: Arc<IntentCatalogStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub completion_configured: bool,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(
        version: String,
        metrics: Arc<AppMetrics>,
        catalog: Arc<IntentCatalogStore>,
        sessions: Arc<dyn SessionStore>,
        completion_configured: bool,
    ) -> Self {
        Self {
            metrics,
            catalog,
            sessions,
            completion_configured,
            start_time: Utc::now(),
            version,
        }
    }

    /// 获取应用正常运行时间
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_seconds() as f64
    }

    /// The service can answer something: intents are loaded or completion is on.
    pub fn is_ready(&self) -> bool {
        !self.catalog.snapshot().is_empty() || self.completion_configured
    }

    fn checks(&self) -> Vec<HealthCheck> {
        let intents = self.catalog.snapshot().len();
        vec![
            HealthCheck::new(
                "intent_catalog",
                intents > 0,
                format!("{} intents loaded", intents),
            ),
            // Running without a completion key is a supported mode.
            HealthCheck::new(
                "completion",
                true,
                if self.completion_configured {
                    "configured".to_string()
                } else {
                    "not configured".to_string()
                },
            ),
        ]
    }
}

// ===== Health Check Handlers =====

/// 获取完整健康状态
pub async fn health_check(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let ready = state.is_ready();

    let health_status = HealthStatus {
        status: status_label(ready).to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        checks: state.checks(),
    };

    let status_code = if ready {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_status))
}

/// 简单存活检查
pub async fn liveness() -> impl IntoResponse {
    "OK"
}

/// 就绪检查
pub async fn readiness(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    if state.is_ready() {
        (axum::http::StatusCode::OK, "Ready")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    state
        .metrics
        .set_sessions_active(state.sessions.count().await);
    (axum::http::StatusCode::OK, state.metrics.gather())
}

/// 版本信息端点
pub async fn version(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": state.version,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 创建可观测性路由
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .with_state(state)
}

// ===== Structured Logging =====

/// 初始化结构化日志
///
/// `RUST_LOG` overrides `logging.level`. When `logging.log_dir` is set, JSON
/// lines also go to a daily-rolling file; keep the returned guard alive for the
/// life of the process or buffered lines are lost.
pub fn init_tracing(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = if config.structured {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .boxed()
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "devchat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

// ===== Request Metrics Middleware =====

/// 记录请求指标的中间件
pub async fn metrics_middleware(
    State(metrics): State<Arc<AppMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let start = std::time::Instant::now();

    let response = next.run(req).await;

    metrics.record_http_request(start.elapsed().as_millis() as u64);
    if response.status().is_server_error() {
        metrics.record_error();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intent::IntentCatalog;
    use crate::services::session::create_session_store;

    #[test]
    fn test_metrics_gather() {
        let metrics = AppMetrics::default();
        metrics.record_http_request(100);
        metrics.record_turn(&ResponseSource::Intent {
            tag: "greeting".to_string(),
        });
        metrics.record_turn(&ResponseSource::CompletionFailed);
        metrics.record_turn(&ResponseSource::CompletionUnavailable);
        metrics.record_quota_rejection();
        metrics.record_error();

        let output = metrics.gather();
        assert!(output.contains("http_requests_total 1"));
        assert!(output.contains("turns_total 3"));
        assert!(output.contains("intent_matches_total 1"));
        assert!(output.contains("completion_calls_total 1"));
        assert!(output.contains("completion_failures_total 1"));
        assert!(output.contains("quota_rejections_total 1"));
        assert!(output.contains("errors_total 1"));
    }

    #[test]
    fn test_readiness_needs_intents_or_completion() {
        let empty = Arc::new(IntentCatalogStore::fixed(IntentCatalog::empty()));
        let state = ObservabilityState::new(
            "0.1.0".to_string(),
            Arc::new(AppMetrics::default()),
            empty.clone(),
            create_session_store(),
            false,
        );
        assert!(!state.is_ready());

        let state = ObservabilityState::new(
            "0.1.0".to_string(),
            Arc::new(AppMetrics::default()),
            empty,
            create_session_store(),
            true,
        );
        assert!(state.is_ready());
        assert_eq!(state.checks()[0].status, "unhealthy");
        assert_eq!(state.checks()[1].status, "healthy");
    }
}
