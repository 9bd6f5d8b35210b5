//! Identity-provider client module.
//!
//! Wraps the Auth0-shaped identity provider's HTTP surface: device-code
//! login, silent token refresh, logout, and linked-identity management.
//! Tokens are opaque bearer credentials here; signature validation is the
//! provider's and the API's business, not this client's.

mod client;
mod error;
mod tokens;

use async_trait::async_trait;

pub use client::{AuthConfig, DeviceLogin, Identity, IdentityClient};
pub use error::{AuthError, AuthResult};
pub use tokens::{Claims, TokenSet, UserProfile};

/// Minimal identity abstraction the session controller depends on.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Whether an authenticated session exists.
    fn is_authenticated(&self) -> bool;

    /// Profile of the authenticated user, if any.
    fn user(&self) -> Option<UserProfile>;

    /// Acquire a bearer credential, silently refreshing when possible.
    /// Fails with [`AuthError::LoginRequired`] when interaction is needed.
    async fn access_token(&self) -> AuthResult<String>;

    /// Start an interactive login (the CLI equivalent of the browser's
    /// login redirect).
    async fn request_login(&self) -> AuthResult<UserProfile>;
}
