//! Authentication errors.

use thiserror::Error;

/// Result type for identity-provider operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session, or the session can only be restored interactively.
    #[error("login required")]
    LoginRequired,

    /// The provider rejected a request.
    #[error("provider error: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// The device-code login timed out or was denied.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// A token could not be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Transport failure talking to the provider.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token cache could not be read or written.
    #[error("token cache error: {0}")]
    Cache(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::LoginRequired;
        assert_eq!(err.to_string(), "login required");

        let err = AuthError::Provider {
            error: "access_denied".to_string(),
            description: Some("user cancelled".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "provider error: access_denied (user cancelled)"
        );
    }
}
