//! HTTP client for the identity provider.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use super::tokens::{decode_claims, TokenSet, UserProfile};
use super::{AuthError, AuthResult, TokenProvider};

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Identity-provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Provider tenant domain, e.g. `my-tenant.us.auth0.com`.
    pub domain: String,
    /// Application client id.
    pub client_id: String,
    /// API audience requested for access tokens.
    pub audience: Option<String>,
    /// Redirect target registered with the provider. Only used when
    /// building account-linking authorize URLs.
    pub redirect_uri: String,
    /// Scopes requested at login.
    pub scope: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            client_id: String::new(),
            audience: None,
            redirect_uri: "http://localhost:3000".to_string(),
            scope: "openid profile email offline_access".to_string(),
        }
    }
}

/// An in-progress device-code login.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceLogin {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    pub interval: u64,
}

/// One linked identity on the user's account.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub provider: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default, rename = "isSocial")]
    pub is_social: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserIdentities {
    #[serde(default)]
    identities: Vec<Identity>,
}

/// Client for the identity provider's HTTP surface.
///
/// Holds the cached token set; the cache file plays the role the
/// browser's local storage plays for the SPA SDK.
pub struct IdentityClient {
    config: AuthConfig,
    http: reqwest::Client,
    cache_path: PathBuf,
    tokens: RwLock<Option<TokenSet>>,
}

impl IdentityClient {
    /// Create a client, restoring any cached session from `cache_path`.
    pub fn new(config: AuthConfig, cache_path: PathBuf) -> Self {
        let tokens = TokenSet::load(&cache_path);
        if tokens.is_some() {
            debug!("restored session from {}", cache_path.display());
        }
        Self {
            config,
            http: reqwest::Client::new(),
            cache_path,
            tokens: RwLock::new(tokens),
        }
    }

    fn base_url(&self) -> String {
        format!("https://{}", self.config.domain)
    }

    /// RP-initiated logout URL for ending the provider's browser session.
    pub fn logout_url(&self) -> String {
        format!(
            "{}/v2/logout?client_id={}",
            self.base_url(),
            self.config.client_id
        )
    }

    fn build_link_url(&self, connection: &str, access_token: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&connection={}&redirect_uri={}&scope={}&access_token={}",
            self.base_url(),
            self.config.client_id,
            connection,
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope),
            access_token
        )
    }

    /// Authorize URL that links `connection` to the current account when
    /// opened in a browser.
    pub async fn link_url(&self, connection: &str) -> AuthResult<String> {
        let token = self.access_token().await?;
        Ok(self.build_link_url(connection, &token))
    }

    /// Start a device-code login.
    pub async fn begin_login(&self) -> AuthResult<DeviceLogin> {
        let mut form = vec![
            ("client_id", self.config.client_id.clone()),
            ("scope", self.config.scope.clone()),
        ];
        if let Some(audience) = &self.config.audience {
            form.push(("audience", audience.clone()));
        }

        let response = self
            .http
            .post(format!("{}/oauth/device/code", self.base_url()))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        Ok(response.json::<DeviceLogin>().await?)
    }

    /// Poll the token endpoint until the device login completes.
    pub async fn complete_login(&self, device: &DeviceLogin) -> AuthResult<UserProfile> {
        let deadline = std::time::Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = device.interval.max(1);

        loop {
            if std::time::Instant::now() >= deadline {
                return Err(AuthError::LoginFailed("device code expired".to_string()));
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;

            let response = self
                .http
                .post(format!("{}/oauth/token", self.base_url()))
                .form(&[
                    ("grant_type", DEVICE_GRANT),
                    ("device_code", device.device_code.as_str()),
                    ("client_id", self.config.client_id.as_str()),
                ])
                .send()
                .await?;

            if response.status().is_success() {
                let body = response.json::<TokenResponse>().await?;
                let tokens = TokenSet::from_response(
                    body.access_token,
                    body.id_token,
                    body.refresh_token,
                    body.expires_in,
                );
                let profile = profile_from(&tokens)?;
                self.store_tokens(tokens)?;
                return Ok(profile);
            }

            let body = response.json::<OAuthErrorBody>().await?;
            match body.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => interval += 5,
                "expired_token" => {
                    return Err(AuthError::LoginFailed("device code expired".to_string()))
                }
                "access_denied" => {
                    return Err(AuthError::LoginFailed("access was denied".to_string()))
                }
                _ => {
                    return Err(AuthError::Provider {
                        error: body.error,
                        description: body.error_description,
                    })
                }
            }
        }
    }

    /// Exchange a refresh token for a fresh token set.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenSet> {
        let response = self
            .http
            .post(format!("{}/oauth/token", self.base_url()))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            // A rejected refresh token means the session is gone; the
            // caller falls back to an interactive login.
            let err = provider_error(response).await;
            warn!("token refresh rejected: {}", err);
            return Err(AuthError::LoginRequired);
        }

        let body = response.json::<TokenResponse>().await?;
        let mut tokens = TokenSet::from_response(
            body.access_token,
            body.id_token,
            body.refresh_token,
            body.expires_in,
        );
        // Providers may rotate or omit the refresh token; keep the old one
        // if no replacement came back.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        self.store_tokens(tokens.clone())?;
        Ok(tokens)
    }

    /// Drop the cached session. Returns the browser logout URL.
    pub fn logout(&self) -> AuthResult<String> {
        *self.tokens.write().expect("token lock poisoned") = None;
        TokenSet::clear(&self.cache_path)?;
        Ok(self.logout_url())
    }

    /// Linked identities on the current user's account.
    pub async fn identities(&self) -> AuthResult<Vec<Identity>> {
        let token = self.access_token().await?;
        let profile = self.user().ok_or(AuthError::LoginRequired)?;

        let response = self
            .http
            .get(format!(
                "{}/api/v2/users/{}?fields=identities&include_fields=true",
                self.base_url(),
                urlencoding::encode(&profile.sub)
            ))
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        Ok(response.json::<UserIdentities>().await?.identities)
    }

    /// Unlink a social connection from the current account via the
    /// provider's management API.
    pub async fn unlink_identity(&self, connection: &str) -> AuthResult<()> {
        let token = self.access_token().await?;
        let profile = self.user().ok_or(AuthError::LoginRequired)?;

        let response = self
            .http
            .delete(format!(
                "{}/api/v2/users/{}/identities/{}",
                self.base_url(),
                urlencoding::encode(&profile.sub),
                connection
            ))
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        Ok(())
    }

    fn store_tokens(&self, tokens: TokenSet) -> AuthResult<()> {
        tokens.save(&self.cache_path)?;
        *self.tokens.write().expect("token lock poisoned") = Some(tokens);
        Ok(())
    }
}

/// Profile from the freshest identity-bearing token in the set.
fn profile_from(tokens: &TokenSet) -> AuthResult<UserProfile> {
    let token = tokens.id_token.as_deref().unwrap_or(&tokens.access_token);
    Ok(decode_claims(token)?.into())
}

async fn provider_error(response: reqwest::Response) -> AuthError {
    let status = response.status();
    match response.json::<OAuthErrorBody>().await {
        Ok(body) => AuthError::Provider {
            error: body.error,
            description: body.error_description,
        },
        Err(_) => AuthError::Provider {
            error: format!("http status {}", status),
            description: None,
        },
    }
}

#[async_trait]
impl TokenProvider for IdentityClient {
    fn is_authenticated(&self) -> bool {
        self.tokens.read().expect("token lock poisoned").is_some()
    }

    fn user(&self) -> Option<UserProfile> {
        let guard = self.tokens.read().expect("token lock poisoned");
        let tokens = guard.as_ref()?;
        match profile_from(tokens) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("could not decode cached token claims: {}", e);
                None
            }
        }
    }

    async fn access_token(&self) -> AuthResult<String> {
        let refresh_token = {
            let guard = self.tokens.read().expect("token lock poisoned");
            match guard.as_ref() {
                None => return Err(AuthError::LoginRequired),
                Some(tokens) if tokens.is_fresh() => return Ok(tokens.access_token.clone()),
                Some(tokens) => tokens.refresh_token.clone(),
            }
        };

        let Some(refresh_token) = refresh_token else {
            return Err(AuthError::LoginRequired);
        };

        debug!("access token expired, refreshing silently");
        let tokens = self.refresh(&refresh_token).await?;
        Ok(tokens.access_token)
    }

    async fn request_login(&self) -> AuthResult<UserProfile> {
        let device = self.begin_login().await?;

        let url = device
            .verification_uri_complete
            .as_deref()
            .unwrap_or(&device.verification_uri);
        println!("To sign in, open {url}");
        println!("and confirm the code: {}", device.user_code);

        let profile = self.complete_login(&device).await?;
        println!("Signed in as {}", profile.email.as_deref().unwrap_or(&profile.sub));
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_client() -> (TempDir, IdentityClient) {
        let temp = TempDir::new().unwrap();
        let config = AuthConfig {
            domain: "tenant.us.auth0.com".to_string(),
            client_id: "client123".to_string(),
            audience: Some("https://api.example.com".to_string()),
            ..AuthConfig::default()
        };
        let client = IdentityClient::new(config, temp.path().join("tokens.json"));
        (temp, client)
    }

    #[test]
    fn test_logout_url() {
        let (_temp, client) = test_client();
        assert_eq!(
            client.logout_url(),
            "https://tenant.us.auth0.com/v2/logout?client_id=client123"
        );
    }

    #[test]
    fn test_link_url_shape() {
        let (_temp, client) = test_client();
        let url = client.build_link_url("github", "tok");
        assert!(url.starts_with("https://tenant.us.auth0.com/authorize?"));
        assert!(url.contains("connection=github"));
        assert!(url.contains("client_id=client123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000"));
        assert!(url.contains("access_token=tok"));
    }

    #[tokio::test]
    async fn test_no_session_requires_login() {
        let (_temp, client) = test_client();
        assert!(!client.is_authenticated());
        let err = client.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::LoginRequired));
    }
}
