#![deny(missing_docs)]
//! # murmur-types: shared vocabulary for the murmur chat engine
//!
//! Every other murmur crate speaks in these types. Nothing here performs I/O.
//!
//! | Concern | Types |
//! |---------|-------|
//! | Conversation | [`Role`], [`ChatMessage`], [`Conversation`], [`StreamAccumulator`] |
//! | Catalog | [`Model`], [`Catalog`] |
//! | Request tuning | [`InferenceOptions`], [`EngineSettings`] |
//! | Engine output | [`EngineEvent`], [`GenerationId`], [`GenerationState`], [`StatusKind`] |
//! | Persistence | [`ConversationStore`] |
//! | Errors | [`TransportError`], [`FetchError`], [`BufferOverflow`], [`SendError`], [`StoreError`] |

pub mod catalog;
pub mod error;
pub mod event;
pub mod message;
pub mod options;
pub mod store;

pub use catalog::{Catalog, Model};
pub use error::{BufferOverflow, FetchError, SendError, StoreError, TransportError};
pub use event::{EngineEvent, GenerationId, GenerationState, StatusKind};
pub use message::{ChatMessage, Conversation, Role, StreamAccumulator};
pub use options::{EngineSettings, InferenceOptions};
pub use store::ConversationStore;
