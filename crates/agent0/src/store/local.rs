//! Local JSON-file chat store.
//!
//! Chats and messages are kept as two JSON arrays in fixed-name files
//! under the data directory. Durability is bounded by the filesystem;
//! this backend exists so the client can run entirely offline.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::models::{Chat, Message, NewMessage, DEFAULT_CHAT_TITLE};
use super::{ChatStore, StoreError, StoreResult};

const CHATS_FILE: &str = "agent0-chats.json";
const MESSAGES_FILE: &str = "agent0-messages.json";

/// Chat store backed by JSON files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn chats_path(&self) -> PathBuf {
        self.dir.join(CHATS_FILE)
    }

    fn messages_path(&self) -> PathBuf {
        self.dir.join(MESSAGES_FILE)
    }

    /// Read a JSON array file. A missing file is an empty list; an
    /// unreadable or corrupt file is logged and treated as empty so the
    /// client stays usable.
    async fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("failed to read {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!("corrupt store file {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Write a JSON array file. Write failures propagate to the caller.
    async fn write_records<T: serde::Serialize>(&self, path: &Path, records: &[T]) -> StoreResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }
        let bytes = serde_json::to_vec_pretty(records)?;
        fs::write(path, &bytes).await?;
        debug!("wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    async fn read_chats(&self) -> Vec<Chat> {
        Self::read_records(&self.chats_path()).await
    }

    async fn read_messages(&self) -> Vec<Message> {
        Self::read_records(&self.messages_path()).await
    }

    async fn write_chats(&self, chats: &[Chat]) -> StoreResult<()> {
        self.write_records(&self.chats_path(), chats).await
    }

    async fn write_messages(&self, messages: &[Message]) -> StoreResult<()> {
        self.write_records(&self.messages_path(), messages).await
    }
}

#[async_trait]
impl ChatStore for LocalStore {
    async fn create_chat(&self, user_id: &str, title: Option<&str>) -> StoreResult<Chat> {
        let mut chats = self.read_chats().await;

        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or(DEFAULT_CHAT_TITLE).to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        chats.push(chat.clone());
        self.write_chats(&chats).await?;

        Ok(chat)
    }

    async fn chat_by_id(&self, chat_id: &str) -> StoreResult<Option<Chat>> {
        let chats = self.read_chats().await;
        Ok(chats.into_iter().find(|chat| chat.id == chat_id))
    }

    async fn user_chats(&self, user_id: &str) -> StoreResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .read_chats()
            .await
            .into_iter()
            .filter(|chat| chat.user_id == user_id)
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn update_chat_title(&self, chat_id: &str, title: &str) -> StoreResult<Chat> {
        let mut chats = self.read_chats().await;

        let chat = chats
            .iter_mut()
            .find(|chat| chat.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;

        chat.title = title.to_string();
        chat.updated_at = Utc::now();
        let updated = chat.clone();

        self.write_chats(&chats).await?;
        Ok(updated)
    }

    async fn delete_chat(&self, chat_id: &str) -> StoreResult<()> {
        let mut chats = self.read_chats().await;
        let mut messages = self.read_messages().await;

        chats.retain(|chat| chat.id != chat_id);
        messages.retain(|message| message.chat_id != chat_id);

        self.write_chats(&chats).await?;
        self.write_messages(&messages).await?;
        Ok(())
    }

    async fn add_message(&self, chat_id: &str, message: NewMessage) -> StoreResult<Message> {
        let mut messages = self.read_messages().await;
        let mut chats = self.read_chats().await;

        let record = Message {
            id: Uuid::new_v4().to_string(),
            content: message.content,
            role: message.role,
            created_at: Utc::now(),
            chat_id: chat_id.to_string(),
        };

        messages.push(record.clone());
        self.write_messages(&messages).await?;

        if let Some(chat) = chats.iter_mut().find(|chat| chat.id == chat_id) {
            chat.updated_at = Utc::now();
            self.write_chats(&chats).await?;
        }

        Ok(record)
    }

    async fn chat_messages(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .read_messages()
            .await
            .into_iter()
            .filter(|message| message.chat_id == chat_id)
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}
