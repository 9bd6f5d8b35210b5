//! Wire types for the agent endpoint.

use serde::{Deserialize, Serialize};

use crate::store::MessageRole;

/// One conversation turn as sent over the wire. Internal identifiers and
/// timestamps never cross this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurn {
    pub content: String,
    pub role: MessageRole,
}

/// Request body for `POST /agent`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub messages: Vec<AgentTurn>,
}

/// Success body from `POST /agent`. Anything beyond `response` is
/// ignored, not validated.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentReply {
    pub response: String,
}
