//! Token set caching and claims parsing.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{AuthError, AuthResult};

/// Refresh this long before the recorded expiry.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// JWT claims this client reads. Everything else is passed through
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's identifier at the provider.
    pub sub: String,
    /// Expiration (seconds since epoch).
    pub exp: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Profile of the authenticated user, derived from ID-token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider subject, e.g. `auth0|abc123`. Used as the chat owner id.
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<Claims> for UserProfile {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub,
            name: claims.name,
            email: claims.email,
        }
    }
}

/// A cached set of credentials from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When `access_token` stops being usable.
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build a token set from a token-endpoint response.
    pub fn from_response(
        access_token: String,
        id_token: Option<String>,
        refresh_token: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            id_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    /// Whether the access token is still good for at least the leeway
    /// window.
    pub fn is_fresh(&self) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_LEEWAY_SECS) > Utc::now()
    }

    /// Load a cached token set, if one exists. Corrupt caches are logged
    /// and discarded - the user just logs in again.
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!("discarding corrupt token cache {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the token set.
    pub fn save(&self, path: &Path) -> AuthResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuthError::Cache(format!("{}: {}", parent.display(), e)))?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| AuthError::Cache(e.to_string()))?;
        std::fs::write(path, &bytes)
            .map_err(|e| AuthError::Cache(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Remove a persisted token set. Missing files are fine.
    pub fn clear(path: &Path) -> AuthResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Cache(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Parse claims out of a JWT without verifying its signature.
///
/// The token is only decoded to identify the user locally; it is never
/// trusted for authorization decisions on this side of the wire.
pub fn decode_claims(token: &str) -> AuthResult<Claims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Token signed with a throwaway secret; only the claims matter,
    /// since signature validation is disabled on decode.
    fn test_token() -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let claims = Claims {
            sub: "auth0|u1".to_string(),
            exp: 4_102_444_800,
            name: None,
            email: Some("u1@example.com".to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test"),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_claims() {
        let claims = decode_claims(&test_token()).unwrap();
        assert_eq!(claims.sub, "auth0|u1");
        assert_eq!(claims.email.as_deref(), Some("u1@example.com"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_claims("not-a-jwt").is_err());
    }

    #[test]
    fn test_freshness() {
        let fresh = TokenSet::from_response("t".to_string(), None, None, 3600);
        assert!(fresh.is_fresh());

        let stale = TokenSet::from_response("t".to_string(), None, None, 10);
        assert!(!stale.is_fresh());
    }

    #[test]
    fn test_cache_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tokens.json");

        let tokens = TokenSet::from_response(
            "access".to_string(),
            Some(test_token()),
            Some("refresh".to_string()),
            3600,
        );
        tokens.save(&path).unwrap();

        let loaded = TokenSet::load(&path).unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));

        TokenSet::clear(&path).unwrap();
        assert!(TokenSet::load(&path).is_none());
        // Clearing twice is fine.
        TokenSet::clear(&path).unwrap();
    }
}
