//! Smoke tests against a local Ollama instance.
//!
//! These tests are `#[ignore]` by default. Run them with:
//!
//!     cargo test -p murmur --test smoke_ollama -- --ignored
//!
//! They require a running Ollama server with at least one model pulled.
//! Start Ollama first: `ollama serve` then `ollama pull llama3.2:1b`.

use std::sync::Arc;

use murmur::prelude::*;

#[derive(Default)]
struct Collect {
    text: String,
    done: bool,
    failed: Option<String>,
}

impl EventSink for Collect {
    fn on_delta(&mut self, text: &str) {
        self.text.push_str(text);
    }
    fn on_generation_finished(&mut self, _message: &ChatMessage) {
        self.done = true;
    }
    fn on_generation_cancelled(&mut self, _message: &ChatMessage) {}
    fn on_generation_failed(&mut self, reason: &str) {
        self.failed = Some(reason.to_owned());
    }
    fn on_catalog_replaced(&mut self, _catalog: &Catalog, _selected: Option<&str>) {}
    fn on_status(&mut self, _text: &str, _kind: StatusKind) {}
}

fn client() -> ChatClient<HttpTransport, Collect> {
    ChatClient::new(Arc::new(HttpTransport::new()), Collect::default()).with_web_search(false)
}

#[tokio::test]
#[ignore = "requires local Ollama"]
async fn smoke_catalog() {
    let mut c = client();
    c.refresh_models();
    let event = c.next_event().await;

    assert!(matches!(event, Some(EngineEvent::CatalogReplaced(_))), "got: {event:?}");
    assert!(!c.state().catalog().is_empty(), "pull a model first");
    assert!(c.state().selected_model().is_some());
}

#[tokio::test]
#[ignore = "requires local Ollama"]
async fn smoke_streamed_reply() {
    let mut c = client().with_options(InferenceOptions {
        temperature: 0.0,
        ..InferenceOptions::default()
    });
    c.refresh_models();
    c.next_event().await;

    c.send_chat("What is 2+2? Reply with just the number.").unwrap();
    c.run_until_idle().await;

    assert_eq!(c.sink().failed, None);
    assert!(c.sink().done);
    assert!(c.sink().text.contains('4'), "reply: {}", c.sink().text);
    assert_eq!(c.state().conversation().len(), 2);
}
