//! Chat messages, conversations, and the in-flight reply accumulator.

use serde::{Deserialize, Serialize};

use crate::event::GenerationId;

/// Who authored a message.
///
/// Serialized lowercase to match the `/api/chat` wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person at the keyboard.
    User,
    /// Produced by the model.
    Assistant,
}

/// A single turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// An ordered, append-only sequence of [`ChatMessage`]s with a stable id.
///
/// The id names the conversation in persistent storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// An empty conversation.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    /// A conversation restored from previously stored messages.
    pub fn with_messages(id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            id: id.into(),
            messages,
        }
    }

    /// Storage id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append a message at the end.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// The assistant's reply-so-far for exactly one in-flight generation.
///
/// Created when a chat request starts and turned into a [`ChatMessage`]
/// by [`finish`](StreamAccumulator::finish) once the stream completes or
/// is cancelled.
#[derive(Debug)]
pub struct StreamAccumulator {
    generation: GenerationId,
    text: String,
}

impl StreamAccumulator {
    /// Start an empty reply for `generation`.
    pub fn new(generation: GenerationId) -> Self {
        Self {
            generation,
            text: String::new(),
        }
    }

    /// The generation this reply belongs to.
    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    /// Append one streamed fragment.
    pub fn push_delta(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the accumulator into the final assistant message.
    pub fn finish(self) -> ChatMessage {
        ChatMessage::assistant(self.text)
    }
}
