use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Environment prefix for overrides, e.g. `DEVCHAT_SERVER__PORT=8080`.
const ENV_PREFIX: &str = "DEVCHAT_";

/// Conventional variable holding the completion credential.
const COMPLETION_KEY_ENV: &str = "GROQ_API_KEY";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序（后者覆盖前者）：
    /// 1. 内置默认值（开发或生产）
    /// 2. ./config.toml
    /// 3. `GROQ_API_KEY`
    /// 4. `DEVCHAT_` 前缀的环境变量
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// `DEVCHAT_ENVIRONMENT=production` selects the production defaults.
    fn base_defaults() -> AppConfig {
        match std::env::var(format!("{}ENVIRONMENT", ENV_PREFIX)).as_deref() {
            Ok("production") => AppConfig::production(),
            _ => AppConfig::development(),
        }
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::base_defaults()))
            .merge(Toml::file(path))
            .merge(
                Env::raw()
                    .only(&[COMPLETION_KEY_ENV])
                    .map(|_| "completion.api_key".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.server.request_timeout == 0 {
            return Err(ConfigValidationError::InvalidRequestTimeout);
        }

        if config.completion.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidCompletionTimeout);
        }

        if config.intents.path.as_os_str().is_empty() {
            return Err(ConfigValidationError::MissingIntentsPath);
        }

        if config.completion.model.trim().is_empty() {
            return Err(ConfigValidationError::MissingModel);
        }

        if config.session.unauthenticated_query_limit == 0 {
            return Err(ConfigValidationError::InvalidQueryLimit);
        }

        if config.session.max_sessions == 0 {
            return Err(ConfigValidationError::InvalidMaxSessions);
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("server port must be greater than 0")]
    InvalidPort,

    #[error("server.request_timeout must be greater than 0")]
    InvalidRequestTimeout,

    #[error("completion.timeout_secs must be greater than 0")]
    InvalidCompletionTimeout,

    #[error("intents.path is not configured")]
    MissingIntentsPath,

    #[error("completion.model is not configured")]
    MissingModel,

    #[error("session.unauthenticated_query_limit must be greater than 0")]
    InvalidQueryLimit,

    #[error("session.max_sessions must be greater than 0")]
    InvalidMaxSessions,
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}
