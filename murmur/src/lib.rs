#![deny(missing_docs)]
//! # murmur: umbrella crate
//!
//! One import surface for the murmur chat engine: shared types, the HTTP
//! transport and the engine always; config and history stores behind
//! feature flags. The `prelude` covers the usual client setup.

pub use murmur_engine;
pub use murmur_transport;
pub use murmur_types;

#[cfg(feature = "config")]
pub use murmur_config;
#[cfg(feature = "history")]
pub use murmur_history;

/// Happy-path imports for driving a chat client.
pub mod prelude {
    pub use murmur_engine::{ChatClient, ClientState, ConversationError, EventSink};
    pub use murmur_transport::{HttpTransport, Transport};
    pub use murmur_types::{
        Catalog, ChatMessage, Conversation, ConversationStore, EngineEvent, EngineSettings,
        GenerationId, GenerationState, InferenceOptions, Role, SendError, StatusKind,
    };

    #[cfg(feature = "config")]
    pub use murmur_config::{ChatConfig, ConfigStore};

    #[cfg(feature = "history")]
    pub use murmur_history::FsConversationStore;
}
