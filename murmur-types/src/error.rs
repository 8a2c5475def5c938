//! Error types for all murmur crates.

use std::time::Duration;

/// Errors from a single HTTP exchange.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached (refused, DNS failure, reset).
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    /// The request exceeded its timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// The byte sink asked the transport to stop.
    #[error("aborted")]
    Aborted,
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, read in full.
        body: String,
    },
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the transport stopped because the sink requested it.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Errors from fetching the model catalog.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The `GET` itself failed.
    #[error("request failed: {0}")]
    Transport(#[from] TransportError),
    /// The body was not a complete catalog; nothing from it is used.
    #[error("invalid catalog: {0}")]
    Parse(String),
}

/// A delivery would have pushed the line buffer past its capacity.
///
/// Non-fatal: the buffer has already been reset and the delivery dropped
/// by the time the caller sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("line buffer overflow: {buffered} buffered + {incoming} incoming > {capacity}")]
pub struct BufferOverflow {
    /// Bytes held before the delivery (now discarded).
    pub buffered: usize,
    /// Size of the rejected delivery.
    pub incoming: usize,
    /// Fixed buffer capacity.
    pub capacity: usize,
}

/// Why a chat request was not started. Client state is left untouched.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// A generation is already in flight.
    #[error("a generation is already in progress")]
    AlreadyGenerating,
    /// No model is selected.
    #[error("no model selected")]
    NoModelSelected,
    /// The message is empty or whitespace.
    #[error("message is empty")]
    EmptyMessage,
}

/// Errors from conversation persistence.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing storage failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Stored data could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The id cannot name a stored conversation.
    #[error("invalid conversation id: {0:?}")]
    InvalidId(String),
}
