// End-to-end driver tests against a mock Gemini SSE endpoint.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use wiremock::matchers::{header_exists, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_core::clients::ClientCache;
use relay_core::delta::{Delta, UsageDelta};
use relay_core::error::ErrorCode;
use relay_core::request::{GenerateRequest, LlmConfig, Message};
use relay_core::retry::RetryPolicy;
use relay_core::signatures::SignatureCache;
use relay_google::GeminiDriver;

fn driver_for(server: &MockServer) -> GeminiDriver {
    GeminiDriver::new(Arc::new(ClientCache::new()), Arc::new(SignatureCache::new()))
        .with_api_base(server.uri())
        .with_policy(RetryPolicy {
            stream_timeout: Duration::from_secs(5),
            ..RetryPolicy::default()
        })
}

fn request(credential_env: &str) -> GenerateRequest {
    GenerateRequest {
        session_id: "sess-1".into(),
        execution_id: "exec-1".into(),
        config: LlmConfig {
            model: "gemini-2.5-pro".into(),
            credential_env: credential_env.into(),
            ..Default::default()
        },
        messages: vec![Message::user("Hi")],
        tools: vec![],
    }
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("data: {e}\n\n"))
        .collect::<String>()
}

async fn collect(driver: &GeminiDriver, request: GenerateRequest) -> Vec<Delta> {
    driver.generate(request).collect().await
}

#[tokio::test]
async fn streams_text_and_final_marker() {
    std::env::set_var("GEMINI_TEST_KEY_S1", "test-key");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r".*streamGenerateContent$"))
        .and(header_exists("x-goog-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello!"}]}}]
            })]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let deltas = collect(&driver_for(&server), request("GEMINI_TEST_KEY_S1")).await;
    assert_eq!(deltas, vec![Delta::Text("Hello!".into()), Delta::Final]);
}

#[tokio::test]
async fn usage_follows_content_before_the_final_marker() {
    std::env::set_var("GEMINI_TEST_KEY_S2", "test-key");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Hello!"}]}}],
                "usageMetadata": {
                    "promptTokenCount": 10,
                    "candidatesTokenCount": 20,
                    "totalTokenCount": 30,
                    "thoughtsTokenCount": 5
                }
            })]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let deltas = collect(&driver_for(&server), request("GEMINI_TEST_KEY_S2")).await;
    assert_eq!(
        deltas,
        vec![
            Delta::Text("Hello!".into()),
            Delta::Usage(UsageDelta {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
                thinking_tokens: 5,
            }),
            Delta::Final,
        ]
    );
}

#[tokio::test]
async fn function_call_is_delivered_complete_with_canonical_name() {
    std::env::set_var("GEMINI_TEST_KEY_S3", "test-key");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[serde_json::json!({
                "candidates": [{"content": {"parts": [
                    {"functionCall": {"name": "server__read", "args": {"path": "/tmp"}}}
                ]}}]
            })]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let deltas = collect(&driver_for(&server), request("GEMINI_TEST_KEY_S3")).await;
    assert_eq!(deltas.len(), 2);
    match &deltas[0] {
        Delta::ToolCall(tc) => {
            assert_eq!(tc.name, "server.read");
            assert_eq!(tc.arguments, r#"{"path":"/tmp"}"#);
            assert_eq!(tc.call_id.len(), 8);
        }
        other => panic!("unexpected delta {other:?}"),
    }
    assert_eq!(deltas[1], Delta::Final);
}

#[tokio::test]
async fn empty_stream_is_retried_then_succeeds() {
    std::env::set_var("GEMINI_TEST_KEY_S4", "test-key");
    let server = MockServer::start().await;

    // First attempt: a stream with no content-bearing parts.
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(String::new(), "text/event-stream"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })]),
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let deltas = collect(&driver_for(&server), request("GEMINI_TEST_KEY_S4")).await;
    assert_eq!(deltas, vec![Delta::Text("ok".into()), Delta::Final]);
}

#[tokio::test]
async fn missing_credential_env_fails_without_calling_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let deltas = collect(&driver_for(&server), request("GEMINI_TEST_KEY_UNSET")).await;
    assert_eq!(deltas.len(), 1);
    match &deltas[0] {
        Delta::Error(err) => {
            assert_eq!(err.code, ErrorCode::Credentials);
            assert!(err.message.contains("GEMINI_TEST_KEY_UNSET"));
            assert!(!err.retryable);
        }
        other => panic!("unexpected delta {other:?}"),
    }
}

#[tokio::test]
async fn upstream_http_error_is_a_provider_error() {
    std::env::set_var("GEMINI_TEST_KEY_HTTP", "test-key");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let deltas = collect(&driver_for(&server), request("GEMINI_TEST_KEY_HTTP")).await;
    assert_eq!(deltas.len(), 1);
    match &deltas[0] {
        Delta::Error(err) => {
            assert_eq!(err.code, ErrorCode::ProviderError);
            assert!(err.message.contains("400"), "message: {}", err.message);
        }
        other => panic!("unexpected delta {other:?}"),
    }
}

#[tokio::test]
async fn thought_signature_lands_in_the_shared_cache() {
    std::env::set_var("GEMINI_TEST_KEY_SIG", "test-key");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[serde_json::json!({
                "candidates": [{"content": {"parts": [
                    {"text": "done", "thoughtSignature": "sig-xyz"}
                ]}}]
            })]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let signatures = Arc::new(SignatureCache::new());
    let driver = GeminiDriver::new(Arc::new(ClientCache::new()), Arc::clone(&signatures))
        .with_api_base(server.uri());
    let deltas = collect(&driver, request("GEMINI_TEST_KEY_SIG")).await;

    assert_eq!(deltas, vec![Delta::Text("done".into()), Delta::Final]);
    assert_eq!(signatures.get("exec-1").as_deref(), Some("sig-xyz"));
}
