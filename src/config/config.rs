use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 请求超时（秒）
    pub request_timeout: u64,
}

/// Rule file location and reload behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IntentsConfig {
    /// Path of the JSON rule file
    pub path: PathBuf,
    /// Re-read the rule file on every turn so edits apply without a restart
    pub reload_each_turn: bool,
}

/// External completion service (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CompletionConfig {
    /// Bearer credential; `None` disables the fallback path
    pub api_key: Option<String>,
    /// Base URL up to, not including, `/chat/completions`
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl CompletionConfig {
    /// Whether a usable credential is present.
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Visitor session settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the session id
    pub cookie_name: String,
    /// Queries an unauthenticated visitor may make per session
    pub unauthenticated_query_limit: u32,
    /// Sessions idle longer than this are evicted（秒）
    pub idle_ttl_secs: u64,
    /// How often the idle sweep runs（秒）
    pub sweep_interval_secs: u64,
    /// Upper bound on stored sessions; the least recently active is evicted
    pub max_sessions: usize,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// API keys that identify authenticated visitors
    pub api_keys: HashSet<String>,
    /// HS256 secret for bearer tokens issued by the login flow; empty disables JWT
    pub jwt_secret: String,
    /// JWT issuer
    pub jwt_issuer: String,
    /// JWT audience
    pub jwt_audience: String,
    /// CORS allowed origins
    pub cors_allowed_origins: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件路径
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// Rule file
    pub intents: IntentsConfig,
    /// Completion fallback
    pub completion: CompletionConfig,
    /// Visitor sessions
    pub session: SessionConfig,
    /// 安全配置
    pub security: SecurityConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 5001,
                request_timeout: 60,
            },
            intents: IntentsConfig {
                path: PathBuf::from("data/intents.json"),
                reload_each_turn: true,
            },
            completion: CompletionConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".into(),
                model: "llama-3.3-70b-versatile".into(),
                timeout_secs: 30,
            },
            session: SessionConfig {
                cookie_name: "devchat_sid".into(),
                unauthenticated_query_limit: 10,
                idle_ttl_secs: 2 * 60 * 60,
                sweep_interval_secs: 10 * 60,
                max_sessions: 10_000,
            },
            security: SecurityConfig {
                api_keys: HashSet::new(),
                jwt_secret: String::new(),
                jwt_issuer: "devchat".into(),
                jwt_audience: "devchat-web".into(),
                cors_allowed_origins: vec!["http://localhost:5001".into()],
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
            },
            app_name: "devchat".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.intents.reload_each_turn = false;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.session.unauthenticated_query_limit, 10);
        assert_eq!(config.completion.model, "llama-3.3-70b-versatile");
        assert!(config.intents.reload_each_turn);
        assert!(!config.completion.is_configured());
    }

    #[test]
    fn test_production_caches_catalog() {
        let config = AppConfig::production();
        assert_eq!(config.environment, "production");
        assert!(!config.intents.reload_each_turn);
        assert!(config.logging.structured);
    }

    #[test]
    fn test_blank_api_key_is_not_configured() {
        let mut completion = AppConfig::development().completion;
        completion.api_key = Some("   ".into());
        assert!(!completion.is_configured());

        completion.api_key = Some("gsk_test".into());
        assert!(completion.is_configured());
    }
}
