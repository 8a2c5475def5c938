//! The engine against a mock Ollama server over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use murmur_engine::{ChatClient, EventSink};
use murmur_transport::HttpTransport;
use murmur_types::{
    Catalog, ChatMessage, EngineEvent, EngineSettings, GenerationState, StatusKind,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Transcript {
    text: String,
    finished: Vec<ChatMessage>,
    failures: Vec<String>,
    statuses: Vec<(String, StatusKind)>,
}

impl EventSink for Transcript {
    fn on_delta(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn on_generation_finished(&mut self, message: &ChatMessage) {
        self.finished.push(message.clone());
    }

    fn on_generation_cancelled(&mut self, message: &ChatMessage) {
        self.finished.push(message.clone());
    }

    fn on_generation_failed(&mut self, reason: &str) {
        self.failures.push(reason.to_owned());
    }

    fn on_catalog_replaced(&mut self, _catalog: &Catalog, _selected: Option<&str>) {}

    fn on_status(&mut self, text: &str, kind: StatusKind) {
        self.statuses.push((text.to_owned(), kind));
    }
}

fn client(server: &MockServer) -> ChatClient<HttpTransport, Transcript> {
    let settings = EngineSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        catalog_timeout: Duration::from_secs(5),
        ..EngineSettings::default()
    };
    ChatClient::new(Arc::new(HttpTransport::new()), Transcript::default())
        .with_settings(settings)
        .with_web_search(false)
}

async fn mount_tags(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn catalog_then_streamed_reply() {
    let server = MockServer::start().await;
    mount_tags(
        &server,
        r#"{"models":[{"name":"llama3.2:1b","size":1321098329},{"name":"qwen2.5:0.5b"}]}"#,
    )
    .await;

    let ndjson = concat!(
        r#"{"model":"llama3.2:1b","message":{"role":"assistant","content":"The"},"done":false}"#,
        "\n",
        r#"{"model":"llama3.2:1b","message":{"role":"assistant","content":" sky"},"done":false}"#,
        "\n",
        r#"{"model":"llama3.2:1b","message":{"role":"assistant","content":" is blue."},"done":false}"#,
        "\n",
        r#"{"model":"llama3.2:1b","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
        "\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama3.2:1b",
            "stream": true,
            "messages": [{"role": "user", "content": "Why is the sky blue?"}],
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(ndjson),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut c = client(&server);
    c.refresh_models();
    assert!(matches!(c.next_event().await, Some(EngineEvent::CatalogReplaced(_))));
    assert_eq!(c.state().selected_model(), Some("llama3.2:1b"));

    c.send_chat("Why is the sky blue?").unwrap();
    c.run_until_idle().await;

    assert_eq!(c.sink().text, "The sky is blue.");
    assert_eq!(
        c.sink().finished,
        [ChatMessage::assistant("The sky is blue.")]
    );
    assert_eq!(c.state().conversation().len(), 2);
    assert_eq!(c.state().generation(), GenerationState::Idle);
}

#[tokio::test]
async fn unknown_model_fails_generation() {
    let server = MockServer::start().await;
    mount_tags(&server, r#"{"models":[{"name":"gone"}]}"#).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"error":"model 'gone' not found"}"#),
        )
        .mount(&server)
        .await;

    let mut c = client(&server);
    c.refresh_models();
    c.next_event().await;
    c.send_chat("hello").unwrap();
    c.run_until_idle().await;

    assert_eq!(c.sink().failures.len(), 1);
    assert!(c.sink().failures[0].starts_with("HTTP 404"));
    assert!(c.sink().finished.is_empty());
    assert_eq!(c.state().conversation().messages(), [ChatMessage::user("hello")]);
}

#[tokio::test]
async fn body_without_done_is_incomplete() {
    let server = MockServer::start().await;
    mount_tags(&server, r#"{"models":[{"name":"m"}]}"#).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"message\":{\"content\":\"par\"}}\n"),
        )
        .mount(&server)
        .await;

    let mut c = client(&server);
    c.refresh_models();
    c.next_event().await;
    c.send_chat("hello").unwrap();
    c.run_until_idle().await;

    assert_eq!(c.sink().text, "par");
    assert_eq!(c.sink().failures, ["stream ended before completion"]);
}

#[tokio::test]
async fn unreachable_server_reports_no_models() {
    let settings = EngineSettings {
        base_url: "http://127.0.0.1:9".into(),
        ..EngineSettings::default()
    };
    let mut c = ChatClient::new(Arc::new(HttpTransport::new()), Transcript::default())
        .with_settings(settings);
    c.refresh_models();

    assert!(matches!(c.next_event().await, Some(EngineEvent::CatalogUnavailable(_))));
    assert!(c.state().catalog().is_empty());
    assert_eq!(
        c.sink().statuses,
        [("No models found".to_owned(), StatusKind::Error)]
    );
}
