// Integration tests for the chat flow
//
// Tests cover:
// - The shipped rule file
// - Quota gate, name memory and fallback through the public service API
// - Rule file problems falling through to completion
// - The HTTP completion client end to end

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use devchat::config::AppConfig;
use devchat::error::AppError;
use devchat::models::IntentCatalog;
use devchat::observability::AppMetrics;
use devchat::services::completion::PROCESSING_FAILED_MESSAGE;
use devchat::services::{
    ChatService, CompletionClient, CompletionError, CompletionFallback, IntentCatalogLoader,
    IntentCatalogStore, ResponseSource, create_chat_service, create_session_store,
    create_turn_orchestrator, match_intent,
};

/// Completion backend that echoes a canned answer and counts calls.
struct StubCompletion {
    answer: Result<String, ()>,
    calls: AtomicUsize,
}

impl StubCompletion {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: Err(()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .map_err(|_| CompletionError::MalformedResponse("stub failure".to_string()))
    }
}

fn shipped_rules() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/intents.json")
}

fn chat_with(catalog: IntentCatalogStore, fallback: CompletionFallback) -> ChatService {
    create_chat_service(
        create_session_store(),
        create_turn_orchestrator(Arc::new(catalog), fallback),
        10,
        Arc::new(AppMetrics::default()),
    )
}

fn rule_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_shipped_rule_file_is_valid() {
    let catalog = IntentCatalogLoader::new(shipped_rules()).try_load().unwrap();
    for tag in [
        "greeting",
        "how_are_you",
        "user_name",
        "coding_tips",
        "junior_developer",
        "ai",
        "development",
        "programming_languages",
    ] {
        assert!(catalog.get(tag).is_some(), "missing intent {tag}");
    }

    assert_eq!(
        match_intent(&catalog, "Hello there").map(|i| i.tag()),
        Some("greeting")
    );
    assert_eq!(
        match_intent(&catalog, "What is Machine Learning?").map(|i| i.tag()),
        Some("ai")
    );
}

#[tokio::test]
async fn test_informational_answer_is_stable_across_turns() {
    let chat = chat_with(
        IntentCatalogStore::new(IntentCatalogLoader::new(shipped_rules()), false),
        CompletionFallback::unconfigured(),
    );

    let first = chat
        .chat("s", true, Some("any coding tips?"))
        .await
        .unwrap();
    for _ in 0..5 {
        let again = chat
            .chat("s", true, Some("any coding tips?"))
            .await
            .unwrap();
        assert_eq!(again.text, first.text);
    }
    assert_eq!(
        first.source,
        ResponseSource::Intent {
            tag: "coding_tips".to_string()
        }
    );
}

#[tokio::test]
async fn test_full_conversation_with_fallback() {
    let stub = StubCompletion::answering("Ownership means one owner per value, [name].");
    let chat = chat_with(
        IntentCatalogStore::new(IntentCatalogLoader::new(shipped_rules()), true),
        CompletionFallback::new(stub.clone()),
    );

    let reply = chat
        .chat("visitor", false, Some("my name is Alice"))
        .await
        .unwrap();
    assert!(reply.text.contains("Alice"));

    let reply = chat
        .chat("visitor", false, Some("explain ownership in rust please"))
        .await
        .unwrap();
    assert_eq!(reply.source, ResponseSource::Completion);
    assert_eq!(reply.text, "Ownership means one owner per value, Alice.");
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

    let summary = chat.summary("visitor", false).await;
    assert_eq!(summary.remembered_name.as_deref(), Some("Alice"));
    assert_eq!(summary.remaining_queries, Some(8));
}

#[tokio::test]
async fn test_quota_rejection_makes_no_completion_call() {
    let stub = StubCompletion::answering("answer");
    let chat = chat_with(
        IntentCatalogStore::fixed(IntentCatalog::empty()),
        CompletionFallback::new(stub.clone()),
    );

    for _ in 0..10 {
        chat.chat("anon", false, Some("question")).await.unwrap();
    }
    let err = chat.chat("anon", false, Some("question")).await.unwrap_err();
    assert!(matches!(err, AppError::QuotaExceeded { limit: 10 }));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_html_rule_file_falls_through_to_completion() {
    let file = rule_file("<!DOCTYPE html>\n<html><body>Not Found</body></html>");
    let stub = StubCompletion::answering("from the model");
    let chat = chat_with(
        IntentCatalogStore::new(IntentCatalogLoader::new(file.path()), true),
        CompletionFallback::new(stub.clone()),
    );

    let reply = chat.chat("s", false, Some("hello")).await.unwrap();
    assert_eq!(reply.text, "from the model");
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rule_file_edits_apply_on_next_turn() {
    let file = rule_file(r#"{"intents": []}"#);
    let chat = chat_with(
        IntentCatalogStore::new(IntentCatalogLoader::new(file.path()), true),
        CompletionFallback::new(StubCompletion::answering("fallback")),
    );
    assert_eq!(
        chat.chat("s", true, Some("ping")).await.unwrap().text,
        "fallback"
    );

    std::fs::write(
        file.path(),
        r#"{"intents": [{"tag": "ping", "patterns": ["ping"], "responses": ["pong"]}]}"#,
    )
    .unwrap();
    assert_eq!(chat.chat("s", true, Some("ping")).await.unwrap().text, "pong");
}

#[tokio::test]
async fn test_failing_completion_returns_generic_message() {
    let chat = chat_with(
        IntentCatalogStore::fixed(IntentCatalog::empty()),
        CompletionFallback::new(StubCompletion::failing()),
    );
    let reply = chat.chat("s", false, Some("anything")).await.unwrap();
    assert_eq!(reply.text, PROCESSING_FAILED_MESSAGE);
    assert_eq!(reply.source, ResponseSource::CompletionFailed);
}

#[tokio::test]
async fn test_configured_fallback_calls_completion_endpoint() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Traits define shared behaviour."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = AppConfig::development().completion;
    config.base_url = server.uri();
    config.api_key = Some("gsk_test".to_string());
    let fallback = CompletionFallback::from_config(&config);
    assert!(fallback.is_configured());

    let chat = chat_with(IntentCatalogStore::fixed(IntentCatalog::empty()), fallback);
    let reply = chat.chat("s", false, Some("what are traits?")).await.unwrap();
    assert_eq!(reply.text, "Traits define shared behaviour.");
}
