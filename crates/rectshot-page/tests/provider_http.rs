//! HTTP-level tests for the Responses client and the full page flow.

use std::sync::{Arc, Mutex};

use rectshot_core::config::ProviderConfig;
use rectshot_core::{CaptureRect, Preferences};
use rectshot_page::{
    png_data_url, EntryStatus, InboundEvent, Notifier, NullView, OpenAiResponsesClient,
    PageContext, ProceedOutcome, ProviderError, RenderState, VisionProvider,
};
use rectshot_secrets::{initialize, CredentialStore, ScriptedPrompter, UnlockFlow};
use rectshot_storage::MemoryStore;
use secrecy::SecretString;
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

fn client_for(server: &MockServer) -> OpenAiResponsesClient {
    OpenAiResponsesClient::new(ProviderConfig {
        endpoint: format!("{}/v1/responses", server.uri()),
        ..ProviderConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_sends_bearer_key_model_and_image() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/responses"))
        .and(matchers::header("authorization", "Bearer sk-xyz"))
        .and(matchers::body_partial_json(json!({
            "model": "o1",
            "reasoning": { "effort": "low" },
            "input": [{ "role": "user" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output_text": "a chart" })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client_for(&server)
        .explain(&SecretString::from("sk-xyz"), "o1", IMAGE)
        .await
        .unwrap();
    assert_eq!(answer, "a chart");
}

#[tokio::test]
async fn test_nested_output_is_joined() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{ "type": "message", "content": [
                { "type": "output_text", "text": "line one" },
                { "type": "output_text", "text": "line two" }
            ]}]
        })))
        .mount(&server)
        .await;

    let answer = client_for(&server)
        .explain(&SecretString::from("sk"), "o1", IMAGE)
        .await
        .unwrap();
    assert_eq!(answer, "line one\nline two");
}

#[tokio::test]
async fn test_remote_error_carries_message() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#,
        ))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .explain(&SecretString::from("bad"), "o1", IMAGE)
        .await
        .unwrap_err();
    match &err {
        ProviderError::Remote { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
    assert_eq!(
        err.history_text(),
        "Error from OpenAI: Incorrect API key provided"
    );
}

#[tokio::test]
async fn test_non_json_success_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .explain(&SecretString::from("sk"), "o1", IMAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Parse(_)));
    assert!(err.history_text().starts_with("Network or parsing error: "));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_network_error() {
    let client = OpenAiResponsesClient::new(ProviderConfig {
        endpoint: "http://127.0.0.1:1/v1/responses".into(),
        timeout_secs: 5,
        ..ProviderConfig::default()
    })
    .unwrap();

    let err = client
        .explain(&SecretString::from("sk"), "o1", IMAGE)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)));
}

// ── Full page flow ───────────────────────────────────────────────────────

#[derive(Default)]
struct Alerts(Mutex<Vec<String>>);

impl Notifier for Alerts {
    fn alert(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

fn viewport() -> String {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::new(40, 30));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    png_data_url(&buf.into_inner())
}

#[tokio::test]
async fn test_encrypted_key_wrong_then_right_passphrase() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::header("authorization", "Bearer sk-xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output_text": "explained" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new(Arc::new(MemoryStore::new()));
    initialize(
        &store,
        &SecretString::from("sk-xyz"),
        Some(&SecretString::from("hunter2")),
    )
    .unwrap();

    let alerts = Arc::new(Alerts::default());
    let prompter = Arc::new(ScriptedPrompter::new([Some("wrong"), Some("hunter2")]));
    let ctx = PageContext::new(
        Preferences::default(),
        UnlockFlow::new(store, prompter.clone()),
        Arc::new(client_for(&server)),
        Arc::new(NullView),
        alerts.clone(),
    );

    ctx.handle_event(InboundEvent::CaptureResult {
        data_url: viewport(),
        rect: CaptureRect {
            x: 5.0,
            y: 5.0,
            width: 10.0,
            height: 10.0,
        },
        dpr: Some(1.0),
    })
    .await;

    assert_eq!(ctx.proceed().await, ProceedOutcome::Aborted);
    assert_eq!(
        alerts.0.lock().unwrap().as_slice(),
        ["Failed to decrypt API key. Check your password and try again.".to_string()]
    );
    assert_eq!(ctx.render_state(), RenderState::Empty);

    assert!(matches!(ctx.proceed().await, ProceedOutcome::Submitted(_)));
    assert_eq!(
        ctx.render_state(),
        RenderState::Entry {
            position: 1,
            total: 1,
            status: EntryStatus::Done,
            text: "explained".into(),
        }
    );
    assert_eq!(prompter.times_prompted(), 2);
}
