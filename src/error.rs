//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。
//!
//! Only boundary-level failures live here. Catalog and completion failures have
//! their own error types and are recovered inside their services, so they never
//! reach an HTTP response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 认证错误
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 授权错误
    #[error("Unauthorized access: {0}")]
    Authorization(String),

    /// 参数验证错误
    ///
    /// Reported to the caller verbatim.
    #[error("{0}")]
    Validation(String),

    /// Unauthenticated visitor used up the query allowance.
    #[error(
        "Sorry, you have exceeded the {limit}-query limit for unauthenticated users. Please register or log in."
    )]
    QuotaExceeded { limit: u32 },

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();
        let mut body = ErrorResponse::new(&code, &self.to_string());
        if matches!(self, AppError::QuotaExceeded { .. }) {
            body = body.with_limit_reached();
        }
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response()
    }
}

/// 错误响应
///
/// `response` carries the human-readable text; the browser client renders that
/// field for both successful and rejected turns.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub response: String,
    /// Set when the visitor hit the unauthenticated query limit.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub limit_reached: bool,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(code: &str, response: &str) -> Self {
        Self {
            code: code.to_string(),
            response: response.to_string(),
            limit_reached: false,
        }
    }

    /// Mark the body as a quota rejection.
    pub fn with_limit_reached(mut self) -> Self {
        self.limit_reached = true;
        self
    }
}

/// HTTP 状态码映射
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::Authentication(_) => (401, "UNAUTHORIZED".to_string()),
            AppError::Authorization(_) => (403, "FORBIDDEN".to_string()),
            AppError::Validation(_) => (400, "BAD_REQUEST".to_string()),
            AppError::QuotaExceeded { .. } => (403, "QUOTA_EXCEEDED".to_string()),
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;
