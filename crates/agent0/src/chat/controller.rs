//! Chat session controller.
//!
//! Orchestrates one chat screen: optimistic transcript updates,
//! credential acquisition, persistence, and the agent endpoint call.
//! Collaborators are injected at construction; the controller never
//! knows which storage backend is active.

use anyhow::{anyhow, Context, Result};
use log::{error, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::{AgentApi, AgentTurn};
use crate::auth::{AuthError, TokenProvider};
use crate::store::{ChatStore, MessageRole, NewMessage};

/// Canned greeting shown in an empty chat. In-memory only, never
/// persisted.
pub const GREETING: &str = "Hello! How can I help you today?";

/// Fixed apology turn inserted into the transcript when a send fails.
/// Never persisted.
pub const SEND_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

const TITLE_MAX_CHARS: usize = 30;

/// One in-memory transcript entry.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
}

fn greeting_turn() -> ChatTurn {
    ChatTurn {
        id: "1".to_string(),
        content: GREETING.to_string(),
        role: MessageRole::Assistant,
    }
}

/// What a send attempt did, for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant replied; transcript and store were updated.
    Replied,
    /// Nothing to send: empty input, or a send already in flight.
    Ignored,
    /// No usable session. A login was triggered and the send was
    /// abandoned with no state change.
    LoginRequired,
    /// The send failed; the transcript gained the fixed error turn.
    Failed,
}

/// Controller for a single chat screen.
pub struct ChatController {
    store: Arc<dyn ChatStore>,
    agent: Arc<dyn AgentApi>,
    identity: Arc<dyn TokenProvider>,
    chat_id: Option<String>,
    title: String,
    turns: Vec<ChatTurn>,
    is_sending: bool,
}

impl ChatController {
    /// Controller for a brand-new chat. The chat record itself is created
    /// lazily on the first send.
    pub fn new(
        store: Arc<dyn ChatStore>,
        agent: Arc<dyn AgentApi>,
        identity: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            store,
            agent,
            identity,
            chat_id: None,
            title: crate::store::DEFAULT_CHAT_TITLE.to_string(),
            turns: vec![greeting_turn()],
            is_sending: false,
        }
    }

    /// Load an existing chat owned by the current user. Replays persisted
    /// messages into the transcript; an empty chat shows the greeting.
    pub async fn load(&mut self, chat_id: &str) -> Result<()> {
        let user = self
            .identity
            .user()
            .ok_or_else(|| anyhow!("not signed in"))?;

        let chat = self
            .store
            .chat_by_id(chat_id)
            .await?
            .filter(|chat| chat.user_id == user.sub)
            .ok_or_else(|| anyhow!("chat not found: {chat_id}"))?;

        let messages = self.store.chat_messages(&chat.id).await?;

        self.title = chat.title;
        self.chat_id = Some(chat.id);
        self.turns = if messages.is_empty() {
            vec![greeting_turn()]
        } else {
            messages
                .into_iter()
                .map(|m| ChatTurn {
                    id: m.id,
                    content: m.content,
                    role: m.role,
                })
                .collect()
        };
        Ok(())
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_sending(&self) -> bool {
        self.is_sending
    }

    /// Rename the loaded chat. Empty titles are rejected; whitespace is
    /// trimmed.
    pub async fn rename(&mut self, new_title: &str) -> Result<bool> {
        let Some(chat_id) = self.chat_id.clone() else {
            return Ok(false);
        };
        let trimmed = new_title.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }

        self.store.update_chat_title(&chat_id, trimmed).await?;
        self.title = trimmed.to_string();
        Ok(true)
    }

    /// Send one user turn through the full flow.
    ///
    /// The sending flag is released on every exit path, so the screen can
    /// never be left stuck in a loading state.
    pub async fn send(&mut self, message: &str) -> SendOutcome {
        if self.is_sending {
            return SendOutcome::Ignored;
        }

        if !self.identity.is_authenticated() {
            // Delegate to the login flow and abandon the send: no state
            // change, no message sent.
            if let Err(e) = self.identity.request_login().await {
                error!("login failed: {}", e);
            }
            return SendOutcome::LoginRequired;
        }

        if message.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        // Optimistic update: the user's turn appears immediately, before
        // any persistence or network work.
        let provisional_id = Uuid::new_v4().to_string();
        self.turns.push(ChatTurn {
            id: provisional_id.clone(),
            content: message.to_string(),
            role: MessageRole::User,
        });
        self.is_sending = true;

        let outcome = match self.dispatch(message, &provisional_id).await {
            Ok(()) => SendOutcome::Replied,
            Err(e) if is_login_required(&e) => {
                warn!("token expired or invalid, starting re-login");
                if let Err(e) = self.identity.request_login().await {
                    error!("login failed: {}", e);
                }
                SendOutcome::LoginRequired
            }
            Err(e) => {
                error!("error sending message: {:#}", e);
                self.turns.push(ChatTurn {
                    id: Uuid::new_v4().to_string(),
                    content: SEND_ERROR_MESSAGE.to_string(),
                    role: MessageRole::Assistant,
                });
                SendOutcome::Failed
            }
        };

        self.is_sending = false;
        outcome
    }

    async fn dispatch(&mut self, message: &str, provisional_id: &str) -> Result<()> {
        let token = self.identity.access_token().await?;
        let user = self
            .identity
            .user()
            .context("no user profile in session")?;

        // First message in a fresh screen: create the chat, then derive
        // its title from the message.
        let mut is_first_message = false;
        let chat_id = match self.chat_id.clone() {
            Some(id) => id,
            None => {
                let chat = self.store.create_chat(&user.sub, None).await?;
                self.title = chat.title.clone();
                self.chat_id = Some(chat.id.clone());
                is_first_message = true;
                chat.id
            }
        };

        let persisted = self
            .store
            .add_message(
                &chat_id,
                NewMessage {
                    content: message.to_string(),
                    role: MessageRole::User,
                },
            )
            .await?;

        // Reconcile the provisional turn with the persisted record.
        if let Some(turn) = self.turns.iter_mut().find(|t| t.id == provisional_id) {
            turn.id = persisted.id;
        }

        if is_first_message {
            let title = derive_title(message);
            self.store.update_chat_title(&chat_id, &title).await?;
            self.title = title;
        }

        let transcript: Vec<AgentTurn> = self
            .turns
            .iter()
            .map(|t| AgentTurn {
                content: t.content.clone(),
                role: t.role,
            })
            .collect();

        let reply = self.agent.send(&token, &transcript).await?;

        self.turns.push(ChatTurn {
            id: Uuid::new_v4().to_string(),
            content: reply.clone(),
            role: MessageRole::Assistant,
        });

        let persisted = self
            .store
            .add_message(
                &chat_id,
                NewMessage {
                    content: reply,
                    role: MessageRole::Assistant,
                },
            )
            .await?;
        if let Some(last) = self.turns.last_mut() {
            last.id = persisted.id;
        }

        Ok(())
    }
}

fn is_login_required(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<AuthError>(), Some(AuthError::LoginRequired))
}

/// Derive a chat title from the first user message: up to 30 characters,
/// with an ellipsis when truncated.
fn derive_title(message: &str) -> String {
    let title = message.trim();
    if title.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = title.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", truncated)
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentError, AgentResult};
    use crate::auth::{AuthResult, UserProfile};
    use crate::store::LocalStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoSession;

    #[async_trait]
    impl TokenProvider for NoSession {
        fn is_authenticated(&self) -> bool {
            false
        }
        fn user(&self) -> Option<UserProfile> {
            None
        }
        async fn access_token(&self) -> AuthResult<String> {
            Err(AuthError::LoginRequired)
        }
        async fn request_login(&self) -> AuthResult<UserProfile> {
            Err(AuthError::LoginRequired)
        }
    }

    struct StaticSession;

    #[async_trait]
    impl TokenProvider for StaticSession {
        fn is_authenticated(&self) -> bool {
            true
        }
        fn user(&self) -> Option<UserProfile> {
            Some(UserProfile {
                sub: "auth0|u1".to_string(),
                name: None,
                email: None,
            })
        }
        async fn access_token(&self) -> AuthResult<String> {
            Ok("test-token".to_string())
        }
        async fn request_login(&self) -> AuthResult<UserProfile> {
            Err(AuthError::LoginRequired)
        }
    }

    struct UnreachableAgent;

    #[async_trait]
    impl AgentApi for UnreachableAgent {
        async fn send(&self, _token: &str, _messages: &[AgentTurn]) -> AgentResult<String> {
            Err(AgentError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        }
    }

    fn controller(temp: &TempDir) -> ChatController {
        ChatController::new(
            Arc::new(LocalStore::new(temp.path())),
            Arc::new(UnreachableAgent),
            Arc::new(NoSession),
        )
    }

    #[test]
    fn test_title_preserved_when_short() {
        assert_eq!(derive_title("Hi"), "Hi");
        assert_eq!(derive_title("  padded  "), "padded");
        let exactly_30 = "a".repeat(30);
        assert_eq!(derive_title(&exactly_30), exactly_30);
    }

    #[test]
    fn test_title_truncated_when_long() {
        let long = "a".repeat(31);
        let title = derive_title(&long);
        assert_eq!(title, format!("{}...", "a".repeat(30)));
        assert_eq!(title.chars().count(), 33);
    }

    #[test]
    fn test_starts_with_greeting() {
        let temp = TempDir::new().unwrap();
        let controller = controller(&temp);
        assert_eq!(controller.turns().len(), 1);
        assert_eq!(controller.turns()[0].content, GREETING);
        assert_eq!(controller.turns()[0].role, MessageRole::Assistant);
        assert!(controller.chat_id().is_none());
    }

    #[tokio::test]
    async fn test_unauthenticated_send_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut controller = controller(&temp);

        let outcome = controller.send("Hi").await;
        assert_eq!(outcome, SendOutcome::LoginRequired);

        // No optimistic turn, no chat, nothing persisted, not stuck.
        assert_eq!(controller.turns().len(), 1);
        assert!(controller.chat_id().is_none());
        assert!(!controller.is_sending());
    }

    #[tokio::test]
    async fn test_empty_send_ignored() {
        let temp = TempDir::new().unwrap();
        let mut controller = ChatController::new(
            Arc::new(LocalStore::new(temp.path())),
            Arc::new(UnreachableAgent),
            Arc::new(StaticSession),
        );

        assert_eq!(controller.send("   ").await, SendOutcome::Ignored);
        assert_eq!(controller.turns().len(), 1);
        assert!(controller.chat_id().is_none());
    }

    #[tokio::test]
    async fn test_in_flight_send_ignored() {
        let temp = TempDir::new().unwrap();
        let mut controller = ChatController::new(
            Arc::new(LocalStore::new(temp.path())),
            Arc::new(UnreachableAgent),
            Arc::new(StaticSession),
        );

        controller.is_sending = true;
        assert_eq!(controller.send("hello").await, SendOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_failed_send_appends_error_turn() {
        let temp = TempDir::new().unwrap();
        let mut controller = ChatController::new(
            Arc::new(LocalStore::new(temp.path())),
            Arc::new(UnreachableAgent),
            Arc::new(StaticSession),
        );

        let outcome = controller.send("Hi").await;
        assert_eq!(outcome, SendOutcome::Failed);

        // Greeting, optimistic user turn, error turn.
        let turns = controller.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "Hi");
        assert_eq!(turns[1].role, MessageRole::User);
        assert_eq!(turns[2].content, SEND_ERROR_MESSAGE);
        assert_eq!(turns[2].role, MessageRole::Assistant);
        assert!(!controller.is_sending());
    }
}
