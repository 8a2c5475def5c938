//! RecordingSink: remembers every callback for later assertions.

use murmur_types::{Catalog, ChatMessage, GenerationState, StatusKind};

use crate::sink::EventSink;

/// One [`EventSink`] callback, as observed.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    /// `on_user_message`
    UserMessage(ChatMessage),
    /// `on_delta`
    Delta(String),
    /// `on_generation_finished`
    Finished(ChatMessage),
    /// `on_generation_cancelled`
    Cancelled(ChatMessage),
    /// `on_generation_failed`
    Failed(String),
    /// `on_catalog_replaced`
    CatalogReplaced {
        /// Model names in order.
        models: Vec<String>,
        /// Selection after the replacement.
        selected: Option<String>,
    },
    /// `on_status`
    Status(String, StatusKind),
    /// `on_generation_state`
    State(GenerationState),
}

/// An [`EventSink`] that records calls in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Vec<SinkCall>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far.
    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    /// Concatenation of all deltas received.
    pub fn streamed_text(&self) -> String {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SinkCall::Delta(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl EventSink for RecordingSink {
    fn on_user_message(&mut self, message: &ChatMessage) {
        self.calls.push(SinkCall::UserMessage(message.clone()));
    }

    fn on_delta(&mut self, text: &str) {
        self.calls.push(SinkCall::Delta(text.to_owned()));
    }

    fn on_generation_finished(&mut self, message: &ChatMessage) {
        self.calls.push(SinkCall::Finished(message.clone()));
    }

    fn on_generation_cancelled(&mut self, message: &ChatMessage) {
        self.calls.push(SinkCall::Cancelled(message.clone()));
    }

    fn on_generation_failed(&mut self, reason: &str) {
        self.calls.push(SinkCall::Failed(reason.to_owned()));
    }

    fn on_catalog_replaced(&mut self, catalog: &Catalog, selected: Option<&str>) {
        self.calls.push(SinkCall::CatalogReplaced {
            models: catalog.names().map(str::to_owned).collect(),
            selected: selected.map(str::to_owned),
        });
    }

    fn on_status(&mut self, text: &str, kind: StatusKind) {
        self.calls.push(SinkCall::Status(text.to_owned(), kind));
    }

    fn on_generation_state(&mut self, state: GenerationState) {
        self.calls.push(SinkCall::State(state));
    }
}
