#![deny(missing_docs)]
//! Filesystem-backed implementation of murmur's [`ConversationStore`].
//!
//! One file per conversation, named by its id, holding the messages as a
//! pretty-printed JSON array:
//!
//! ```text
//! ~/.local/share/ollama-chat/
//!   3f1c9a0e-6b0d-4f5e-9d1a-2c7f0b8e4a11
//!   trip-planning
//! ```
//!
//! Listing orders conversations by file modification time, newest first.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use murmur_types::{ChatMessage, Conversation, ConversationStore, StoreError};

/// Directory under the home directory holding conversations.
pub const HISTORY_DIR: &str = ".local/share/ollama-chat";

/// Conversation store rooted at a directory.
///
/// The directory is created on first save.
#[derive(Debug, Clone)]
pub struct FsConversationStore {
    root: PathBuf,
}

impl FsConversationStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store at `~/.local/share/ollama-chat`, or `None` without a home
    /// directory.
    pub fn default_location() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(HISTORY_DIR)))
    }

    /// The directory conversations live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.root.join(id))
    }
}

/// Ids become file names, so they must name a single plain file.
fn validate_id(id: &str) -> Result<(), StoreError> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if invalid {
        Err(StoreError::InvalidId(id.to_owned()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FsConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let path = self.path_for(conversation.id())?;
        tokio::fs::create_dir_all(&self.root).await?;
        let contents = serde_json::to_string_pretty(conversation.messages())?;
        tokio::fs::write(&path, contents).await?;
        tracing::debug!(
            conversation = conversation.id(),
            messages = conversation.len(),
            "conversation saved"
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let messages: Vec<ChatMessage> = serde_json::from_slice(&bytes)?;
                Ok(Some(Conversation::with_messages(id, messages)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(SystemTime, String)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, name));
        }

        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, id: &str, new_id: &str) -> Result<(), StoreError> {
        let from = self.path_for(id)?;
        let to = self.path_for(new_id)?;
        tokio::fs::rename(&from, &to).await?;
        tracing::debug!(from = id, to = new_id, "conversation renamed");
        Ok(())
    }
}
