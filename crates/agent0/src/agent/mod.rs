//! Agent endpoint client module.
//!
//! Provides an async client for the remote agent's chat completion
//! endpoint. The endpoint's internals are opaque: this client issues one
//! POST per turn and reads a JSON body.

mod client;
mod error;
mod types;

use async_trait::async_trait;

pub use client::AgentClient;
pub use error::{AgentError, AgentResult};
pub use types::{AgentReply, AgentRequest, AgentTurn};

/// Minimal agent API abstraction for testability.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Send the full transcript and return the assistant's reply text.
    async fn send(&self, token: &str, messages: &[AgentTurn]) -> AgentResult<String>;
}
