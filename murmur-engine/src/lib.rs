#![deny(missing_docs)]
//! # murmur-engine: streaming chat against a local inference server
//!
//! The engine talks to an Ollama-compatible server over a
//! [`Transport`](murmur_transport::Transport): it lists installed models
//! (`GET /api/tags`) and streams chat replies (`POST /api/chat`, NDJSON).
//!
//! ```text
//!   consumer task                          workers (tokio::spawn)
//!   ─────────────                          ──────────────────────
//!   ChatClient::send_chat ──spawn──────▶  ChatJob: compose, POST, stream
//!   ChatClient::refresh_models ─spawn──▶  CatalogFetcher: GET, parse
//!                                              │
//!   ChatClient::next_event ◀──EngineEvent──────┘  (unbounded mpsc)
//!     applies to ClientState, calls EventSink
//! ```
//!
//! Workers never touch [`ClientState`]. Cancellation is cooperative: the
//! chat worker checks its token once per received line.

pub mod catalog;
pub mod client;
pub mod compose;
pub mod dispatch;
pub mod error;
pub mod lines;
pub mod sink;
mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use catalog::CatalogFetcher;
pub use client::{ChatClient, ClientState, STATUS_CONNECTED, STATUS_NO_MODELS, STATUS_SAVE_FAILED};
pub use compose::PromptComposer;
pub use dispatch::ChatStream;
pub use error::ConversationError;
pub use lines::{DEFAULT_CAPACITY, LineReassembler, Lines};
pub use sink::EventSink;

use murmur_types::EngineEvent;

/// Producer half of the event queue, cloned into every worker.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<EngineEvent>;
