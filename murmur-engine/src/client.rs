//! The request lifecycle controller and owner of all chat state.
//!
//! [`ChatClient`] lives on the consumer task. It starts workers (catalog
//! fetches, chat generations) and is the only place their results are
//! applied: workers publish [`EngineEvent`]s into a queue, and
//! [`ChatClient::next_event`] drains that queue one event at a time,
//! updating [`ClientState`] and calling the [`EventSink`].
//!
//! At most one chat generation is in flight. While generating, only
//! [`cancel`](ChatClient::cancel), [`refresh_models`](ChatClient::refresh_models)
//! and [`select_model`](ChatClient::select_model) are accepted.

use std::path::PathBuf;
use std::sync::Arc;

use murmur_transport::Transport;
use murmur_types::{
    Catalog, ChatMessage, Conversation, ConversationStore, EngineEvent, EngineSettings,
    GenerationId, GenerationState, InferenceOptions, SendError, StatusKind, StreamAccumulator,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::EventSender;
use crate::catalog::CatalogFetcher;
use crate::compose::PromptComposer;
use crate::dispatch::ChatJob;
use crate::error::ConversationError;
use crate::sink::EventSink;

/// Status published when the catalog is empty or could not be fetched.
pub const STATUS_NO_MODELS: &str = "No models found";
/// Status published when a non-empty catalog arrives.
pub const STATUS_CONNECTED: &str = "Connected";
/// Status published when a finished conversation could not be stored.
pub const STATUS_SAVE_FAILED: &str = "Could not save conversation";

/// Everything the consumer knows. Mutated only by [`ChatClient`].
#[derive(Debug)]
pub struct ClientState {
    catalog: Catalog,
    selected_model: Option<String>,
    conversation: Conversation,
    accumulator: Option<StreamAccumulator>,
    generation: GenerationState,
}

impl ClientState {
    /// Models from the last successful catalog fetch.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The model new generations are sent to.
    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    /// The active conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The reply being streamed, while generating.
    pub fn accumulator(&self) -> Option<&StreamAccumulator> {
        self.accumulator.as_ref()
    }

    /// Idle, generating or cancelling.
    pub fn generation(&self) -> GenerationState {
        self.generation
    }
}

/// Chat engine front door.
pub struct ChatClient<T, S> {
    transport: Arc<T>,
    sink: S,
    settings: EngineSettings,
    options: InferenceOptions,
    web_search: bool,
    attachment_dir: PathBuf,
    store: Option<Arc<dyn ConversationStore>>,
    state: ClientState,
    current: Option<GenerationId>,
    last_generation: GenerationId,
    cancel: Option<CancellationToken>,
    pending_save: Option<JoinHandle<()>>,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl<T, S> ChatClient<T, S>
where
    T: Transport + 'static,
    S: EventSink,
{
    /// Client with default settings and options, a fresh conversation, and
    /// no store.
    pub fn new(transport: Arc<T>, sink: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            sink,
            settings: EngineSettings::default(),
            options: InferenceOptions::default(),
            web_search: true,
            attachment_dir: PathBuf::from("."),
            store: None,
            state: ClientState {
                catalog: Catalog::default(),
                selected_model: None,
                conversation: Conversation::new(new_conversation_id()),
                accumulator: None,
                generation: GenerationState::Idle,
            },
            current: None,
            last_generation: GenerationId::new(0),
            cancel: None,
            pending_save: None,
            events_tx,
            events_rx,
        }
    }

    /// Server location, timeouts and line capacity.
    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sampling options sent with every chat request.
    #[must_use]
    pub fn with_options(mut self, options: InferenceOptions) -> Self {
        self.options = options;
        self
    }

    /// Persist conversations to `store` after every reply.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Whether the first URL in a message is fetched and inlined.
    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Directory `@file` mentions are resolved against.
    #[must_use]
    pub fn with_attachment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachment_dir = dir.into();
        self
    }

    /// Model to select before any catalog has arrived, e.g. from config.
    ///
    /// Kept after the first catalog only if the catalog lists it.
    #[must_use]
    pub fn with_preferred_model(mut self, model: Option<String>) -> Self {
        self.state.selected_model = model;
        self
    }

    /// Current state.
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// The sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Options used for generations started from now on.
    pub fn set_options(&mut self, options: InferenceOptions) {
        self.options = options;
    }

    /// Start a catalog fetch on a worker.
    ///
    /// Independent of generation state. The result arrives as an event.
    pub fn refresh_models(&self) {
        let fetcher = CatalogFetcher::new(
            Arc::clone(&self.transport),
            self.settings.tags_url(),
            self.settings.catalog_timeout,
        );
        tracing::debug!(url = %self.settings.tags_url(), "refreshing model catalog");
        tokio::spawn(fetcher.run(self.events_tx.clone()));
    }

    /// Select `name` if the catalog lists it. Returns whether the
    /// selection changed.
    pub fn select_model(&mut self, name: &str) -> bool {
        if !self.state.catalog.contains(name) || self.state.selected_model() == Some(name) {
            return false;
        }
        tracing::debug!(model = name, "model selected");
        self.state.selected_model = Some(name.to_owned());
        true
    }

    /// Start a generation for `text`.
    ///
    /// The text is trimmed. URL and `@file` context is inlined on the
    /// worker; the user turn is recorded once that is done.
    ///
    /// # Errors
    ///
    /// Rejected without touching state if a generation is in flight, the
    /// text is blank, or no model is selected.
    pub fn send_chat(&mut self, text: &str) -> Result<GenerationId, SendError> {
        if self.state.generation.is_busy() {
            return Err(SendError::AlreadyGenerating);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        let Some(model) = self.state.selected_model.clone() else {
            return Err(SendError::NoModelSelected);
        };

        let generation = self.last_generation.next();
        self.last_generation = generation;
        let cancel = CancellationToken::new();

        let job = ChatJob {
            transport: Arc::clone(&self.transport),
            url: self.settings.chat_url(),
            timeout: self.settings.request_timeout,
            line_capacity: self.settings.line_capacity,
            generation,
            model,
            history: self.state.conversation.messages().to_vec(),
            user_text: text.to_owned(),
            options: self.options.clone(),
            composer: PromptComposer::new(Arc::clone(&self.transport))
                .fetch_urls(self.web_search)
                .url_timeout(self.settings.request_timeout)
                .base_dir(self.attachment_dir.clone()),
            cancel: cancel.clone(),
            events: self.events_tx.clone(),
        };

        self.current = Some(generation);
        self.cancel = Some(cancel);
        self.state.accumulator = Some(StreamAccumulator::new(generation));
        self.set_generation_state(GenerationState::Generating);

        tracing::debug!(%generation, model = %job.model, "generation started");
        tokio::spawn(job.run());
        Ok(generation)
    }

    /// Ask the running generation to stop.
    ///
    /// The worker notices at its next line boundary. Returns `false` if
    /// nothing is generating or cancellation was already requested.
    pub fn cancel(&mut self) -> bool {
        if self.state.generation != GenerationState::Generating {
            return false;
        }
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        self.set_generation_state(GenerationState::Cancelling);
        true
    }

    /// Wait for the next engine event, apply it, and return it.
    ///
    /// Cancel-safe: the only await is the queue receive, and applying an
    /// event never waits. It can sit in a `tokio::select!` branch without
    /// losing events. Returns `None` only if the queue is closed, which
    /// cannot happen while the client is alive.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        let event = self.events_rx.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Apply the next engine event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<EngineEvent> {
        let event = self.events_rx.try_recv().ok()?;
        self.apply(&event);
        Some(event)
    }

    /// Apply events until no generation is in flight, wait for the last
    /// save to land, then apply whatever is already queued.
    pub async fn run_until_idle(&mut self) {
        while self.state.generation.is_busy() {
            if self.next_event().await.is_none() {
                break;
            }
        }
        self.flush_saves().await;
        while self.try_next_event().is_some() {}
    }

    /// Wait until every save started so far has finished.
    ///
    /// Saves run on their own tasks and complete even if this is never
    /// called; a failure arrives later as [`EngineEvent::SaveFailed`].
    pub async fn flush_saves(&mut self) {
        if let Some(handle) = self.pending_save.as_mut() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "conversation save task failed");
            }
        }
        self.pending_save = None;
    }

    /// Save the current conversation (if it has messages) and start an
    /// empty one. Returns the new id.
    ///
    /// # Errors
    ///
    /// [`ConversationError::Busy`] while generating; a store failure while
    /// saving leaves the current conversation in place.
    pub async fn new_conversation(&mut self) -> Result<String, ConversationError> {
        if self.state.generation.is_busy() {
            return Err(ConversationError::Busy);
        }
        self.flush_saves().await;
        if let Some(store) = &self.store {
            if !self.state.conversation.is_empty() {
                store.save(&self.state.conversation).await?;
            }
        }
        let id = new_conversation_id();
        self.state.conversation = Conversation::new(id.clone());
        tracing::debug!(conversation = %id, "new conversation");
        Ok(id)
    }

    /// Replace the current conversation with a stored one.
    ///
    /// # Errors
    ///
    /// [`ConversationError::Busy`] while generating,
    /// [`ConversationError::NoStore`] without a store,
    /// [`ConversationError::NotFound`] for an unknown id.
    pub async fn load_conversation(&mut self, id: &str) -> Result<(), ConversationError> {
        if self.state.generation.is_busy() {
            return Err(ConversationError::Busy);
        }
        let store = self.store.as_ref().ok_or(ConversationError::NoStore)?;
        let conversation = store
            .load(id)
            .await?
            .ok_or_else(|| ConversationError::NotFound(id.to_owned()))?;
        tracing::debug!(conversation = id, messages = conversation.len(), "conversation loaded");
        self.state.conversation = conversation;
        Ok(())
    }

    /// Ids of stored conversations, newest first.
    ///
    /// # Errors
    ///
    /// [`ConversationError::NoStore`] without a store, or the store's error.
    pub async fn saved_conversations(&self) -> Result<Vec<String>, ConversationError> {
        let store = self.store.as_ref().ok_or(ConversationError::NoStore)?;
        Ok(store.list().await?)
    }

    fn apply(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::CatalogReplaced(catalog) => self.replace_catalog(catalog),
            EngineEvent::CatalogUnavailable(reason) => {
                tracing::warn!(reason = %reason, "model catalog unavailable");
                self.sink.on_status(STATUS_NO_MODELS, StatusKind::Error);
            }
            EngineEvent::SaveFailed {
                conversation,
                reason,
            } => {
                tracing::warn!(%conversation, reason = %reason, "could not save conversation");
                self.sink.on_status(STATUS_SAVE_FAILED, StatusKind::Error);
            }
            EngineEvent::UserMessagePrepared {
                generation,
                content,
            } => {
                if !self.is_current(*generation) {
                    return;
                }
                let message = ChatMessage::user(content.as_str());
                self.state.conversation.push(message.clone());
                self.sink.on_user_message(&message);
            }
            EngineEvent::Delta { generation, text } => {
                if !self.is_current(*generation) {
                    return;
                }
                if let Some(acc) = &mut self.state.accumulator {
                    acc.push_delta(text);
                }
                self.sink.on_delta(text);
            }
            EngineEvent::Done { generation } => {
                if !self.is_current(*generation) {
                    return;
                }
                let message = self.finalize_reply();
                self.sink.on_generation_finished(&message);
                self.persist();
            }
            EngineEvent::Cancelled { generation } => {
                if !self.is_current(*generation) {
                    return;
                }
                let message = self.finalize_reply();
                self.sink.on_generation_cancelled(&message);
                self.persist();
            }
            EngineEvent::Failed { generation, reason } => {
                if !self.is_current(*generation) {
                    return;
                }
                tracing::warn!(%generation, reason = %reason, "generation failed");
                self.state.accumulator = None;
                self.end_generation();
                self.sink.on_generation_failed(reason);
            }
        }
    }

    fn is_current(&self, generation: GenerationId) -> bool {
        let current = self.current == Some(generation);
        if !current {
            tracing::debug!(%generation, "dropping event from stale generation");
        }
        current
    }

    fn replace_catalog(&mut self, catalog: &Catalog) {
        tracing::info!(models = catalog.len(), "model catalog replaced");
        self.state.catalog = catalog.clone();

        // The selection survives an empty catalog; only the status changes.
        if catalog.is_empty() {
            self.sink.on_status(STATUS_NO_MODELS, StatusKind::Error);
            return;
        }

        let still_listed = self
            .state
            .selected_model
            .as_deref()
            .is_some_and(|name| catalog.contains(name));
        if !still_listed {
            self.state.selected_model = catalog.first().map(|m| m.name().to_owned());
        }
        self.sink
            .on_catalog_replaced(&self.state.catalog, self.state.selected_model.as_deref());
        self.sink.on_status(STATUS_CONNECTED, StatusKind::Success);
    }

    /// Move the accumulated reply into the conversation and go idle.
    fn finalize_reply(&mut self) -> ChatMessage {
        let message = self
            .state
            .accumulator
            .take()
            .map(StreamAccumulator::finish)
            .unwrap_or_else(|| ChatMessage::assistant(""));
        self.state.conversation.push(message.clone());
        self.end_generation();
        message
    }

    fn end_generation(&mut self) {
        self.current = None;
        self.cancel = None;
        self.set_generation_state(GenerationState::Idle);
    }

    fn set_generation_state(&mut self, state: GenerationState) {
        self.state.generation = state;
        self.sink.on_generation_state(state);
    }

    /// Hand a snapshot of the conversation to the store on its own task.
    ///
    /// Saves are chained so a later snapshot never lands before an earlier
    /// one.
    fn persist(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        let store = Arc::clone(store);
        let snapshot = self.state.conversation.clone();
        let previous = self.pending_save.take();
        let events = self.events_tx.clone();
        self.pending_save = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            match store.save(&snapshot).await {
                Ok(()) => {
                    tracing::debug!(conversation = snapshot.id(), "conversation handed to store");
                }
                Err(e) => {
                    let _ = events.send(EngineEvent::SaveFailed {
                        conversation: snapshot.id().to_owned(),
                        reason: e.to_string(),
                    });
                }
            }
        }));
    }
}

fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{
        InMemoryConversationStore, RecordingSink, Script, ScriptedTransport, SinkCall,
    };
    use async_trait::async_trait;
    use murmur_types::{Model, StoreError, TransportError};
    use tokio::sync::Notify;

    /// Wraps the in-memory store, delaying every save.
    struct SlowStore {
        inner: InMemoryConversationStore,
        delay: Duration,
    }

    #[async_trait]
    impl ConversationStore for SlowStore {
        async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.save(conversation).await
        }

        async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
            self.inner.load(id).await
        }

        async fn list(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list().await
        }

        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }

        async fn rename(&self, id: &str, new_id: &str) -> Result<(), StoreError> {
            self.inner.rename(id, new_id).await
        }
    }

    /// Refuses every write.
    struct ReadOnlyStore;

    #[async_trait]
    impl ConversationStore for ReadOnlyStore {
        async fn save(&self, _conversation: &Conversation) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        async fn load(&self, _id: &str) -> Result<Option<Conversation>, StoreError> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn rename(&self, _id: &str, _new_id: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    const TAGS: &str = r#"{"models":[{"name":"llama3.2"},{"name":"qwen2.5"}]}"#;
    const HEL: &str = "{\"message\":{\"content\":\"Hel\"}}\n";
    const LO: &str = "{\"message\":{\"content\":\"lo\"}}\n";
    const DONE: &str = "{\"done\":true}\n";

    type Client = ChatClient<ScriptedTransport, RecordingSink>;

    fn client(transport: ScriptedTransport) -> Client {
        ChatClient::new(Arc::new(transport), RecordingSink::new()).with_web_search(false)
    }

    fn with_model(transport: ScriptedTransport) -> Client {
        let mut c = client(transport);
        c.replace_catalog(&Catalog::new(vec![Model::new("llama3.2")]));
        c.sink_mut().clear();
        c
    }

    fn catalog(names: &[&str]) -> Catalog {
        names.iter().copied().map(Model::new).collect()
    }

    #[tokio::test]
    async fn refresh_selects_first_model() {
        let mut c = client(ScriptedTransport::new().route("/api/tags", Script::chunks([TAGS])));
        c.refresh_models();
        let event = c.next_event().await;

        assert!(matches!(event, Some(EngineEvent::CatalogReplaced(_))));
        assert_eq!(c.state().catalog().len(), 2);
        assert_eq!(c.state().selected_model(), Some("llama3.2"));
        assert_eq!(
            c.sink().calls(),
            [
                SinkCall::CatalogReplaced {
                    models: vec!["llama3.2".into(), "qwen2.5".into()],
                    selected: Some("llama3.2".into()),
                },
                SinkCall::Status(STATUS_CONNECTED.into(), StatusKind::Success),
            ]
        );
    }

    #[tokio::test]
    async fn replacement_keeps_listed_selection() {
        let mut c = client(ScriptedTransport::new())
            .with_preferred_model(Some("qwen2.5".into()));
        c.replace_catalog(&catalog(&["llama3.2", "qwen2.5"]));
        assert_eq!(c.state().selected_model(), Some("qwen2.5"));

        c.replace_catalog(&catalog(&["mistral"]));
        assert_eq!(c.state().selected_model(), Some("mistral"));
    }

    #[tokio::test]
    async fn empty_catalog_only_reports_status() {
        let mut c = with_model(ScriptedTransport::new());
        c.replace_catalog(&Catalog::default());

        assert!(c.state().catalog().is_empty());
        assert_eq!(c.state().selected_model(), Some("llama3.2"));
        assert_eq!(
            c.sink().calls(),
            [SinkCall::Status(STATUS_NO_MODELS.into(), StatusKind::Error)]
        );
    }

    #[tokio::test]
    async fn unavailable_catalog_keeps_previous() {
        let mut c = with_model(ScriptedTransport::new().route(
            "/api/tags",
            Script::fail(TransportError::ConnectFailed("refused".into())),
        ));
        c.refresh_models();
        let event = c.next_event().await;

        assert!(matches!(event, Some(EngineEvent::CatalogUnavailable(_))));
        assert_eq!(c.state().catalog().len(), 1);
        assert_eq!(c.state().selected_model(), Some("llama3.2"));
        assert_eq!(
            c.sink().calls(),
            [SinkCall::Status(STATUS_NO_MODELS.into(), StatusKind::Error)]
        );
    }

    #[tokio::test]
    async fn select_model_requires_listed_name() {
        let mut c = client(ScriptedTransport::new());
        c.replace_catalog(&catalog(&["a", "b"]));
        assert!(c.select_model("b"));
        assert!(!c.select_model("b"));
        assert!(!c.select_model("zzz"));
        assert_eq!(c.state().selected_model(), Some("b"));
    }

    #[tokio::test]
    async fn send_rejections_leave_state_alone() {
        let mut c = client(ScriptedTransport::new());
        assert_eq!(c.send_chat("hi"), Err(SendError::NoModelSelected));

        let mut c = with_model(ScriptedTransport::new());
        assert_eq!(c.send_chat("   \n"), Err(SendError::EmptyMessage));
        assert_eq!(c.state().generation(), GenerationState::Idle);
        assert!(c.state().conversation().is_empty());
        assert!(c.sink().calls().is_empty());
    }

    #[tokio::test]
    async fn second_send_while_generating_is_rejected() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::new().route(
            "/api/chat",
            Script::chunks([HEL]).then_wait(Arc::clone(&gate)).then_chunk(DONE),
        );
        let mut c = with_model(transport);

        c.send_chat("one").unwrap();
        assert_eq!(c.send_chat("two"), Err(SendError::AlreadyGenerating));
        gate.notify_one();
        c.run_until_idle().await;

        let contents: Vec<_> = c
            .state()
            .conversation()
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["one", "Hel"]);
    }

    #[tokio::test]
    async fn completed_generation_is_recorded_and_saved() {
        let store = Arc::new(InMemoryConversationStore::new());
        let transport =
            ScriptedTransport::new().route("/api/chat", Script::chunks([HEL, LO, DONE]));
        let mut c = with_model(transport).with_store(store.clone());

        let generation = c.send_chat("  hi  ").unwrap();
        assert_eq!(generation, GenerationId::new(1));
        assert_eq!(c.state().generation(), GenerationState::Generating);
        c.run_until_idle().await;

        assert_eq!(c.state().generation(), GenerationState::Idle);
        assert!(c.state().accumulator().is_none());
        assert_eq!(
            c.state().conversation().messages(),
            [ChatMessage::user("hi"), ChatMessage::assistant("Hello")]
        );
        assert_eq!(
            c.sink().calls(),
            [
                SinkCall::State(GenerationState::Generating),
                SinkCall::UserMessage(ChatMessage::user("hi")),
                SinkCall::Delta("Hel".into()),
                SinkCall::Delta("lo".into()),
                SinkCall::State(GenerationState::Idle),
                SinkCall::Finished(ChatMessage::assistant("Hello")),
            ]
        );

        let id = c.state().conversation().id().to_owned();
        let saved = store.load(&id).await.unwrap().unwrap();
        assert_eq!(saved.messages(), c.state().conversation().messages());
    }

    #[tokio::test]
    async fn history_is_sent_with_next_turn() {
        let transport = Arc::new(
            ScriptedTransport::new().route("/api/chat", Script::chunks([HEL, DONE])),
        );
        let mut c = ChatClient::new(Arc::clone(&transport), RecordingSink::new())
            .with_web_search(false);
        c.replace_catalog(&catalog(&["llama3.2"]));

        c.send_chat("first").unwrap();
        c.run_until_idle().await;
        c.send_chat("second").unwrap();
        c.run_until_idle().await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let body: serde_json::Value =
            serde_json::from_slice(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body["messages"],
            serde_json::json!([
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "Hel"},
                {"role": "user", "content": "second"},
            ])
        );
        assert_eq!(c.state().conversation().len(), 4);
    }

    #[tokio::test]
    async fn cancel_keeps_partial_reply() {
        let gate = Arc::new(Notify::new());
        let store = Arc::new(InMemoryConversationStore::new());
        let transport = ScriptedTransport::new().route(
            "/api/chat",
            Script::chunks([HEL])
                .then_wait(Arc::clone(&gate))
                .then_chunk(LO)
                .then_chunk(DONE),
        );
        let mut c = with_model(transport).with_store(store.clone());

        c.send_chat("hi").unwrap();
        // Prepared, then the first delta.
        c.next_event().await;
        c.next_event().await;
        assert_eq!(c.state().accumulator().map(StreamAccumulator::text), Some("Hel"));

        assert!(c.cancel());
        assert!(!c.cancel());
        assert_eq!(c.state().generation(), GenerationState::Cancelling);
        assert_eq!(c.send_chat("again"), Err(SendError::AlreadyGenerating));

        gate.notify_one();
        c.run_until_idle().await;

        assert_eq!(
            c.state().conversation().messages(),
            [ChatMessage::user("hi"), ChatMessage::assistant("Hel")]
        );
        assert_eq!(
            c.sink().calls().last(),
            Some(&SinkCall::Cancelled(ChatMessage::assistant("Hel")))
        );
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_during_stalled_request_keeps_partial_reply() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::new().route(
            "/api/chat",
            Script::chunks([HEL])
                .then_wait(Arc::clone(&gate))
                .then_fail(TransportError::Timeout(Duration::from_secs(30))),
        );
        let mut c = with_model(transport);

        c.send_chat("hi").unwrap();
        c.next_event().await;
        c.next_event().await;
        assert!(c.cancel());
        gate.notify_one();
        c.run_until_idle().await;

        assert_eq!(
            c.state().conversation().messages(),
            [ChatMessage::user("hi"), ChatMessage::assistant("Hel")]
        );
        assert_eq!(
            c.sink().calls().last(),
            Some(&SinkCall::Cancelled(ChatMessage::assistant("Hel")))
        );
    }

    #[tokio::test]
    async fn cancel_when_idle_is_a_no_op() {
        let mut c = with_model(ScriptedTransport::new());
        assert!(!c.cancel());
        assert_eq!(c.state().generation(), GenerationState::Idle);
        assert!(c.sink().calls().is_empty());
    }

    #[tokio::test]
    async fn failure_discards_reply() {
        let store = Arc::new(InMemoryConversationStore::new());
        let transport = ScriptedTransport::new().route(
            "/api/chat",
            Script::chunks([HEL]).then_fail(TransportError::Timeout(Duration::from_secs(30))),
        );
        let mut c = with_model(transport).with_store(store.clone());

        c.send_chat("hi").unwrap();
        c.run_until_idle().await;

        assert_eq!(
            c.state().conversation().messages(),
            [ChatMessage::user("hi")]
        );
        assert_eq!(
            c.sink().calls().last(),
            Some(&SinkCall::Failed("timeout after 30s".into()))
        );
        assert!(store.list().await.unwrap().is_empty());
        // A new generation can start.
        assert_eq!(c.state().generation(), GenerationState::Idle);
    }

    #[tokio::test]
    async fn stale_events_are_dropped() {
        let mut c = with_model(ScriptedTransport::new());
        c.events_tx
            .send(EngineEvent::Delta {
                generation: GenerationId::new(41),
                text: "ghost".into(),
            })
            .unwrap();
        c.events_tx
            .send(EngineEvent::Done {
                generation: GenerationId::new(41),
            })
            .unwrap();

        assert!(c.try_next_event().is_some());
        assert!(c.try_next_event().is_some());
        assert!(c.try_next_event().is_none());
        assert!(c.state().conversation().is_empty());
        assert!(c.sink().calls().is_empty());
    }

    #[tokio::test]
    async fn new_conversation_saves_and_resets() {
        let store = Arc::new(InMemoryConversationStore::new());
        let transport = ScriptedTransport::new().route("/api/chat", Script::chunks([HEL, DONE]));
        let mut c = with_model(transport).with_store(store.clone());

        let untouched = c.state().conversation().id().to_owned();
        let first = c.new_conversation().await.unwrap();
        assert_ne!(first, untouched);
        assert!(store.list().await.unwrap().is_empty());

        c.send_chat("hi").unwrap();
        c.run_until_idle().await;
        let second = c.new_conversation().await.unwrap();
        assert!(c.state().conversation().is_empty());
        assert_eq!(c.state().conversation().id(), second);

        c.load_conversation(&first).await.unwrap();
        assert_eq!(c.state().conversation().len(), 2);
        assert_eq!(c.saved_conversations().await.unwrap(), [first]);
    }

    #[tokio::test]
    async fn conversation_changes_rejected_while_generating() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::new().route(
            "/api/chat",
            Script::chunks([HEL]).then_wait(Arc::clone(&gate)).then_chunk(DONE),
        );
        let store = Arc::new(InMemoryConversationStore::new());
        let mut c = with_model(transport).with_store(store);

        c.send_chat("hi").unwrap();
        assert!(matches!(c.new_conversation().await, Err(ConversationError::Busy)));
        assert!(matches!(c.load_conversation("x").await, Err(ConversationError::Busy)));
        gate.notify_one();
        c.run_until_idle().await;

        assert!(matches!(
            c.load_conversation("missing").await,
            Err(ConversationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_without_store_fails() {
        let mut c = client(ScriptedTransport::new());
        assert!(matches!(c.load_conversation("x").await, Err(ConversationError::NoStore)));
    }

    #[tokio::test]
    async fn save_survives_dropped_next_event() {
        let store = Arc::new(SlowStore {
            inner: InMemoryConversationStore::new(),
            delay: Duration::from_millis(200),
        });
        let transport = ScriptedTransport::new().route("/api/chat", Script::chunks([HEL, DONE]));
        let mut c = with_model(transport).with_store(store.clone());

        c.send_chat("hi").unwrap();
        // Race every event against a short timer, the way a UI loop selects
        // over input and engine events.
        while c.state().generation().is_busy() {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                _ = c.next_event() => {}
            }
        }
        assert_eq!(c.state().conversation().len(), 2);

        c.flush_saves().await;
        let id = c.state().conversation().id().to_owned();
        let saved = store.load(&id).await.unwrap().unwrap();
        assert_eq!(saved.messages(), c.state().conversation().messages());
    }

    #[tokio::test]
    async fn next_event_does_not_wait_for_the_store() {
        let store = Arc::new(SlowStore {
            inner: InMemoryConversationStore::new(),
            delay: Duration::from_secs(30),
        });
        let transport = ScriptedTransport::new().route("/api/chat", Script::chunks([DONE]));
        let mut c = with_model(transport).with_store(store);

        c.send_chat("hi").unwrap();
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while c.state().generation().is_busy() {
                c.next_event().await;
            }
        })
        .await;
        assert!(drained.is_ok(), "applying Done blocked on the store");
        assert_eq!(c.state().generation(), GenerationState::Idle);
    }

    #[tokio::test]
    async fn save_failure_is_reported_as_status() {
        let transport = ScriptedTransport::new().route("/api/chat", Script::chunks([HEL, DONE]));
        let mut c = with_model(transport).with_store(Arc::new(ReadOnlyStore));

        c.send_chat("hi").unwrap();
        c.run_until_idle().await;

        assert_eq!(
            c.sink().calls().last(),
            Some(&SinkCall::Status(STATUS_SAVE_FAILED.into(), StatusKind::Error))
        );
        assert_eq!(c.state().conversation().len(), 2);
    }
}
