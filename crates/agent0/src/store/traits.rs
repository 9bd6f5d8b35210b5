//! Chat store trait definition.

use async_trait::async_trait;

use super::models::{Chat, Message, NewMessage};
use super::StoreResult;

/// Chat persistence capability.
///
/// Implementations are drop-in substitutable: same signatures, same
/// ordering guarantees, same cascade behavior. The session controller is
/// agnostic to which backend is active.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a chat for `user_id`. A `None` title defaults to
    /// [`DEFAULT_CHAT_TITLE`](super::DEFAULT_CHAT_TITLE). Both timestamps
    /// are set to creation time.
    async fn create_chat(&self, user_id: &str, title: Option<&str>) -> StoreResult<Chat>;

    /// Point lookup. Absent chats yield `Ok(None)`, not an error.
    async fn chat_by_id(&self, chat_id: &str) -> StoreResult<Option<Chat>>;

    /// All chats owned by `user_id`, sorted descending by `updated_at`.
    async fn user_chats(&self, user_id: &str) -> StoreResult<Vec<Chat>>;

    /// Set a chat's title and bump `updated_at`. Fails with
    /// [`StoreError::ChatNotFound`](super::StoreError::ChatNotFound) if the
    /// chat does not exist.
    async fn update_chat_title(&self, chat_id: &str, title: &str) -> StoreResult<Chat>;

    /// Remove the chat and every message whose `chat_id` matches. Never
    /// leaves orphaned messages; deleting an absent chat is a no-op.
    async fn delete_chat(&self, chat_id: &str) -> StoreResult<()>;

    /// Append a message and bump the parent chat's `updated_at`.
    async fn add_message(&self, chat_id: &str, message: NewMessage) -> StoreResult<Message>;

    /// All messages in the chat, ascending by `created_at`.
    async fn chat_messages(&self, chat_id: &str) -> StoreResult<Vec<Message>>;
}
