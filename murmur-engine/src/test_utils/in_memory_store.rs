//! InMemoryConversationStore: HashMap-backed ConversationStore for testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use murmur_types::{ChatMessage, Conversation, ConversationStore, StoreError};

/// Conversations kept in a map, with a write counter standing in for
/// modification time.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    data: RwLock<HashMap<String, (u64, Vec<ChatMessage>)>>,
}

impl InMemoryConversationStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
        StoreError::Io(std::io::Error::other(e.to_string()))
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(Self::poisoned)?;
        let stamp = data.values().map(|(s, _)| *s).max().unwrap_or(0) + 1;
        data.insert(
            conversation.id().to_owned(),
            (stamp, conversation.messages().to_vec()),
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let data = self.data.read().map_err(Self::poisoned)?;
        Ok(data
            .get(id)
            .map(|(_, messages)| Conversation::with_messages(id, messages.clone())))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let data = self.data.read().map_err(Self::poisoned)?;
        let mut entries: Vec<_> = data.iter().map(|(id, (stamp, _))| (*stamp, id.clone())).collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, id)| id).collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.data.write().map_err(Self::poisoned)?.remove(id);
        Ok(())
    }

    async fn rename(&self, id: &str, new_id: &str) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(Self::poisoned)?;
        let entry = data.remove(id).ok_or_else(|| {
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, id.to_owned()))
        })?;
        data.insert(new_id.to_owned(), entry);
        Ok(())
    }
}
