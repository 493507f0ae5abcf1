//! 聊天 DTO
//!
//! 定义聊天相关的请求和响应数据结构。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::chat::SessionSummary;

/// 聊天请求
///
/// `message` stays loosely typed so a wrong type is reported with the same
/// validation message as a missing field.
#[derive(Debug, Default)]
pub struct ChatRequest {
    pub message: Option<Value>,
}

impl ChatRequest {
    /// Parse a raw body. Only a JSON object can carry a message; anything else
    /// is treated as an empty request.
    pub fn from_body(body: &[u8]) -> Self {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|value| match value {
                Value::Object(mut fields) => fields.remove("message"),
                _ => None,
            });
        Self { message }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_ref().and_then(Value::as_str)
    }
}

/// 聊天响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// 会话状态响应
#[derive(Debug, Serialize)]
pub struct SessionStateResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub summary: SessionSummary,
}

/// 意图重载响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub intents: usize,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_must_be_a_string() {
        assert_eq!(
            ChatRequest::from_body(br#"{"message": "hi"}"#).message(),
            Some("hi")
        );
        assert_eq!(ChatRequest::from_body(br#"{"message": 42}"#).message(), None);
        assert_eq!(ChatRequest::from_body(br#"{"text": "hi"}"#).message(), None);
        assert_eq!(ChatRequest::from_body(b"not json").message(), None);
        assert_eq!(ChatRequest::from_body(b"").message(), None);
        assert_eq!(ChatRequest::from_body(br#"["hello"]"#).message(), None);
        assert_eq!(ChatRequest::from_body(br#""hello""#).message(), None);
    }
}
