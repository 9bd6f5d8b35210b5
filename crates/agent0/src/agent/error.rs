//! Agent endpoint errors.

use thiserror::Error;

/// Result type for agent endpoint calls.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors from the agent endpoint.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The endpoint answered with a non-success status.
    #[error("agent endpoint returned {0}")]
    Status(reqwest::StatusCode),

    /// Transport failure or an unreadable body.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
