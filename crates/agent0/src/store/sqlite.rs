//! SQLite chat store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::FromRow;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::db::Database;
use super::models::{Chat, Message, MessageRole, NewMessage, DEFAULT_CHAT_TITLE};
use super::{ChatStore, StoreError, StoreResult};

/// Chat store backed by a relational (SQLite) database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Create a store over an open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn fetch_chat(&self, chat_id: &str) -> StoreResult<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, title, user_id, created_at, updated_at FROM chats WHERE id = ?",
        )
        .bind(chat_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(Chat::try_from).transpose()
    }
}

/// Timestamps are stored as fixed-precision RFC 3339 TEXT so that
/// `ORDER BY` on the column matches chronological order.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

#[derive(Debug, FromRow)]
struct ChatRow {
    id: String,
    title: String,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ChatRow> for Chat {
    type Error = StoreError;

    fn try_from(row: ChatRow) -> StoreResult<Self> {
        Ok(Chat {
            id: row.id,
            title: row.title,
            user_id: row.user_id,
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: String,
    content: String,
    role: String,
    created_at: String,
    chat_id: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> StoreResult<Self> {
        let role = row
            .role
            .parse::<MessageRole>()
            .map_err(StoreError::Corrupt)?;
        Ok(Message {
            id: row.id,
            content: row.content,
            role,
            created_at: decode_ts(&row.created_at)?,
            chat_id: row.chat_id,
        })
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    #[instrument(skip(self))]
    async fn create_chat(&self, user_id: &str, title: Option<&str>) -> StoreResult<Chat> {
        let id = Uuid::new_v4().to_string();
        let now = encode_ts(Utc::now());

        debug!("creating chat {} for {}", id, user_id);

        sqlx::query(
            r#"
            INSERT INTO chats (id, title, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(title.unwrap_or(DEFAULT_CHAT_TITLE))
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        self.fetch_chat(&id)
            .await?
            .ok_or_else(|| StoreError::ChatNotFound(id))
    }

    #[instrument(skip(self))]
    async fn chat_by_id(&self, chat_id: &str) -> StoreResult<Option<Chat>> {
        self.fetch_chat(chat_id).await
    }

    #[instrument(skip(self))]
    async fn user_chats(&self, user_id: &str) -> StoreResult<Vec<Chat>> {
        let rows = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, title, user_id, created_at, updated_at
            FROM chats
            WHERE user_id = ?
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Chat::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn update_chat_title(&self, chat_id: &str, title: &str) -> StoreResult<Chat> {
        let now = encode_ts(Utc::now());

        let result = sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(&now)
            .bind(chat_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ChatNotFound(chat_id.to_string()));
        }

        self.fetch_chat(chat_id)
            .await?
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_chat(&self, chat_id: &str) -> StoreResult<()> {
        // Messages go first so a failure can never leave orphans behind a
        // deleted chat.
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn add_message(&self, chat_id: &str, message: NewMessage) -> StoreResult<Message> {
        let id = Uuid::new_v4().to_string();
        let now = encode_ts(Utc::now());

        let mut tx = self.db.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, content, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(chat_id)
        .bind(&message.content)
        .bind(message.role.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, content, role, created_at, chat_id FROM messages WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(self.db.pool())
        .await?;

        Message::try_from(row)
    }

    #[instrument(skip(self))]
    async fn chat_messages(&self, chat_id: &str) -> StoreResult<Vec<Message>> {
        // rowid breaks ties so same-instant turns keep insertion order.
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, content, role, created_at, chat_id
            FROM messages
            WHERE chat_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteStore {
        let db = Database::in_memory().await.unwrap();
        SqliteStore::new(db)
    }

    #[tokio::test]
    async fn test_create_and_fetch_chat() {
        let store = setup().await;

        let chat = store.create_chat("auth0|u1", None).await.unwrap();
        assert_eq!(chat.title, "New Chat");
        assert_eq!(chat.user_id, "auth0|u1");

        let fetched = store.chat_by_id(&chat.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, chat.id);
        assert_eq!(fetched.user_id, "auth0|u1");

        assert!(store.chat_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_chats_ordering() {
        let store = setup().await;

        let a = store.create_chat("u1", Some("a")).await.unwrap();
        let b = store.create_chat("u1", Some("b")).await.unwrap();
        store.create_chat("u2", Some("other")).await.unwrap();

        // Renaming bumps updated_at, moving the chat to the front.
        store.update_chat_title(&a.id, "a2").await.unwrap();

        let chats = store.user_chats("u1").await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, a.id);
        assert_eq!(chats[1].id, b.id);
        assert!(chats.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
    }

    #[tokio::test]
    async fn test_update_title_not_found() {
        let store = setup().await;
        let err = store.update_chat_title("missing", "t").await.unwrap_err();
        assert!(matches!(err, StoreError::ChatNotFound(_)));
    }

    #[tokio::test]
    async fn test_message_flow() {
        let store = setup().await;
        let chat = store.create_chat("u1", None).await.unwrap();

        let m1 = store
            .add_message(
                &chat.id,
                NewMessage {
                    content: "Hi".to_string(),
                    role: MessageRole::User,
                },
            )
            .await
            .unwrap();
        let m2 = store
            .add_message(
                &chat.id,
                NewMessage {
                    content: "Hello!".to_string(),
                    role: MessageRole::Assistant,
                },
            )
            .await
            .unwrap();

        let messages = store.chat_messages(&chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, m1.id);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].id, m2.id);
        assert!(messages[0].created_at <= messages[1].created_at);

        // The parent chat's updated_at was bumped past creation time.
        let fetched = store.chat_by_id(&chat.id).await.unwrap().unwrap();
        assert!(fetched.updated_at >= chat.updated_at);
    }

    #[tokio::test]
    async fn test_delete_chat_cascades() {
        let store = setup().await;
        let chat = store.create_chat("u1", None).await.unwrap();
        let keep = store.create_chat("u1", Some("keep")).await.unwrap();

        for target in [&chat, &keep] {
            store
                .add_message(
                    &target.id,
                    NewMessage {
                        content: "turn".to_string(),
                        role: MessageRole::User,
                    },
                )
                .await
                .unwrap();
        }

        store.delete_chat(&chat.id).await.unwrap();

        assert!(store.chat_by_id(&chat.id).await.unwrap().is_none());
        assert!(store.chat_messages(&chat.id).await.unwrap().is_empty());
        assert_eq!(store.chat_messages(&keep.id).await.unwrap().len(), 1);

        // Deleting again is a no-op.
        store.delete_chat(&chat.id).await.unwrap();
    }
}
