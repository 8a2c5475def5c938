//! Conversation persistence boundary.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::Conversation;

/// Where finished conversations are kept.
///
/// The engine hands over a complete [`Conversation`] after every assistant
/// turn; how it is stored is up to the implementation. Object-safe so a
/// client can hold any backend as `Arc<dyn ConversationStore>`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Write the whole conversation, replacing any previous copy.
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Read a conversation back. `Ok(None)` if it does not exist.
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Ids of stored conversations, most recently written first.
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Remove a conversation. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Give a stored conversation a new id.
    async fn rename(&self, id: &str, new_id: &str) -> Result<(), StoreError>;
}
