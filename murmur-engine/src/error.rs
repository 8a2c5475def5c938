//! Errors raised by conversation management on the client.

use murmur_types::StoreError;

/// Why a conversation could not be started, loaded or saved.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// A generation is in flight; the conversation cannot change under it.
    #[error("a generation is in progress")]
    Busy,
    /// The client was built without a conversation store.
    #[error("no conversation store attached")]
    NoStore,
    /// The store has no conversation with this id.
    #[error("conversation not found: {0}")]
    NotFound(String),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
