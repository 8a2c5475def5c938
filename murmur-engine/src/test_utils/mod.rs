//! In-process doubles for exercising the engine without a server.
//!
//! Available behind the `test-utils` feature flag.

mod in_memory_store;
mod recording_sink;
mod scripted_transport;

pub use in_memory_store::InMemoryConversationStore;
pub use recording_sink::{RecordingSink, SinkCall};
pub use scripted_transport::{Script, ScriptedTransport};
