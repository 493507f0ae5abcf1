//! 补全回退
//!
//! When no intent matches, the utterance goes to an OpenAI-compatible
//! chat-completions endpoint as a single user message. Failures never reach the
//! visitor in detail: they are logged and replaced by a fixed message. One
//! attempt per turn, no retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::config::CompletionConfig;

/// Returned when no credential was configured at startup.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "Sorry, the AI service is currently unavailable. Please try again later.";

/// Returned when the completion call fails for any reason.
pub const PROCESSING_FAILED_MESSAGE: &str =
    "Sorry, I am unable to process your request at the moment. Please try again later.";

/// 补全服务错误
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response could not be decoded: {0}")]
    MalformedResponse(String),

    #[error("completion response contained no text")]
    EmptyCompletion,
}

/// External text-completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete a single user message.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client (Groq by default).
pub struct ChatCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CompletionError::EmptyCompletion);
        }
        Ok(text)
    }
}

/// How the fallback produced its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The service answered.
    Completed,
    /// The service was called and failed.
    Failed,
    /// No client configured; nothing was sent.
    Unavailable,
}

/// Text for the visitor plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReply {
    pub text: String,
    pub outcome: FallbackOutcome,
}

/// 补全回退调用器
#[derive(Clone)]
pub struct CompletionFallback {
    client: Option<Arc<dyn CompletionClient>>,
}

impl std::fmt::Debug for CompletionFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionFallback")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl CompletionFallback {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Fallback with no backend: every call returns the unavailable message.
    pub fn unconfigured() -> Self {
        Self { client: None }
    }

    /// Build from configuration. A missing key or an unbuildable HTTP client
    /// leaves the fallback unconfigured instead of failing startup.
    pub fn from_config(config: &CompletionConfig) -> Self {
        let Some(api_key) = config.api_key.as_deref().filter(|_| config.is_configured()) else {
            warn!("Completion API key is not set; AI fallback answers are unavailable");
            return Self::unconfigured();
        };

        match ChatCompletionClient::new(
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        ) {
            Ok(client) => {
                debug!("Completion fallback configured: {:?}", client);
                Self::new(Arc::new(client))
            }
            Err(e) => {
                error!("Completion client could not be built: {}", e);
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Answer an unmatched utterance.
    pub async fn complete(&self, utterance: &str) -> FallbackReply {
        let Some(client) = &self.client else {
            return FallbackReply {
                text: SERVICE_UNAVAILABLE_MESSAGE.to_string(),
                outcome: FallbackOutcome::Unavailable,
            };
        };

        match client.complete(utterance).await {
            Ok(text) => FallbackReply {
                text,
                outcome: FallbackOutcome::Completed,
            },
            Err(e) => {
                error!("Completion API error: {}", e);
                FallbackReply {
                    text: PROCESSING_FAILED_MESSAGE.to_string(),
                    outcome: FallbackOutcome::Failed,
                }
            }
        }
    }
}
