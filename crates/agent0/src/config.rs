//! Application configuration.
//!
//! Configuration layers, lowest to highest precedence: built-in
//! defaults, `config.toml`, `AGENT0__*` environment variables, and the
//! conventional Auth0 variable names the demo deployments already use
//! (`AUTH0_DOMAIN`, `AUTH0_CLIENT_ID`, `AUTH0_API_AUDIENCE`,
//! `AUTH0_API_HOST`).

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::auth::AuthConfig;
use crate::store::StoreBackend;

const APP_NAME: &str = "agent0";

const DEFAULT_CONFIG: &str = r#"# Agent0 configuration.

[auth]
# Identity provider tenant domain, e.g. "my-tenant.us.auth0.com".
domain = ""
# Application client id.
client_id = ""
# API audience requested for access tokens.
#audience = "https://agent0-api"

[api]
# Agent API host, e.g. "https://api.example.com".
host = ""

[storage]
# Chat persistence backend: "local" (JSON files) or "sqlite".
backend = "local"
# Override the data directory.
#data_dir = "~/.local/share/agent0"
"#;

/// Resolved filesystem locations.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl AppPaths {
    /// Discover paths, honoring an explicit config-file override.
    pub fn discover(override_path: Option<PathBuf>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) if path.is_dir() => path.join("config.toml"),
            Some(path) => path,
            None => default_config_dir()?.join("config.toml"),
        };

        Ok(Self {
            config_file,
            data_dir: default_data_dir()?,
            state_dir: default_state_dir()?,
        })
    }

    /// Where the identity client caches its token set.
    pub fn token_cache(&self) -> PathBuf {
        self.state_dir.join("tokens.json")
    }
}

impl fmt::Display for AppPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config: {} | data: {} | state: {}",
            self.config_file.display(),
            self.data_dir.display(),
            self.state_dir.display()
        )
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

/// Agent API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Agent API host, e.g. `https://api.example.com`.
    pub host: String,
}

/// Chat persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageKind,
    /// Override the data directory.
    pub data_dir: Option<String>,
}

/// Which chat store backend to construct. Exactly one is active per
/// deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON files under the data directory.
    #[default]
    Local,
    /// SQLite database under the data directory.
    Sqlite,
}

/// Configuration problems that keep the chat UI from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required settings are absent.
    #[error("missing required configuration: {}", .keys.join(", "))]
    Missing { keys: Vec<String> },
}

impl AppConfig {
    /// Load configuration, writing a default config file on first run.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        if !paths.config_file.exists() {
            write_default_config(&paths.config_file)?;
        }

        let built = Config::builder()
            .add_source(
                File::from(paths.config_file.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("AGENT0").separator("__"))
            .build()
            .context("building configuration")?;

        let mut config: AppConfig = built
            .try_deserialize()
            .context("deserializing configuration")?;

        config.apply_env_aliases(|name| env::var(name).ok());
        Ok(config)
    }

    /// The conventional Auth0 variable names win over everything else,
    /// so an environment that already exports them just works.
    fn apply_env_aliases(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(domain) = lookup("AUTH0_DOMAIN") {
            self.auth.domain = domain;
        }
        if let Some(client_id) = lookup("AUTH0_CLIENT_ID") {
            self.auth.client_id = client_id;
        }
        if let Some(audience) = lookup("AUTH0_API_AUDIENCE") {
            self.auth.audience = Some(audience);
        }
        if let Some(host) = lookup("AUTH0_API_HOST") {
            self.api.host = host;
        }
    }

    /// Check that everything the chat UI needs is present. The CLI shows
    /// a configuration-error screen instead of the chat UI when this
    /// fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut keys = Vec::new();
        if self.auth.domain.trim().is_empty() {
            keys.push("auth.domain (AUTH0_DOMAIN)".to_string());
        }
        if self.auth.client_id.trim().is_empty() {
            keys.push("auth.client_id (AUTH0_CLIENT_ID)".to_string());
        }
        if self.api.host.trim().is_empty() {
            keys.push("api.host (AUTH0_API_HOST)".to_string());
        }

        if keys.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing { keys })
        }
    }

    /// Resolve the chat store backend selection.
    pub fn store_backend(&self, paths: &AppPaths) -> StoreBackend {
        let data_dir = match &self.storage.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => paths.data_dir.clone(),
        };

        match self.storage.backend {
            StorageKind::Local => StoreBackend::Local { dir: data_dir },
            StorageKind::Sqlite => StoreBackend::Sqlite {
                path: data_dir.join("agent0.db"),
            },
        }
    }
}

fn write_default_config(path: &std::path::Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("invalid config file path: {path:?}"))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("creating config directory: {}", parent.display()))?;
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("writing default config: {}", path.display()))?;
    Ok(())
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::data_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("share").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine data directory"))
}

fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::state_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine state directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.storage.backend, StorageKind::Local);
        assert!(config.auth.domain.is_empty());
        assert!(config.auth.audience.is_none());
    }

    #[test]
    fn test_validate_lists_missing_keys() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        let ConfigError::Missing { keys } = err;
        assert_eq!(keys.len(), 3);
        assert!(keys[0].contains("auth.domain"));
        assert!(keys[2].contains("api.host"));
    }

    #[test]
    fn test_validate_complete_config() {
        let mut config = AppConfig::default();
        config.auth.domain = "tenant.us.auth0.com".to_string();
        config.auth.client_id = "client123".to_string();
        config.api.host = "https://api.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_aliases_win() {
        let mut config = AppConfig::default();
        config.auth.domain = "from-file.auth0.com".to_string();

        config.apply_env_aliases(|name| match name {
            "AUTH0_DOMAIN" => Some("from-env.auth0.com".to_string()),
            "AUTH0_API_HOST" => Some("https://api.example.com".to_string()),
            _ => None,
        });

        assert_eq!(config.auth.domain, "from-env.auth0.com");
        assert_eq!(config.api.host, "https://api.example.com");
        // Untouched values survive.
        assert!(config.auth.client_id.is_empty());
    }

    #[test]
    fn test_store_backend_resolution() {
        let paths = AppPaths {
            config_file: PathBuf::from("/tmp/config.toml"),
            data_dir: PathBuf::from("/tmp/data"),
            state_dir: PathBuf::from("/tmp/state"),
        };

        let mut config = AppConfig::default();
        match config.store_backend(&paths) {
            StoreBackend::Local { dir } => assert_eq!(dir, PathBuf::from("/tmp/data")),
            other => panic!("unexpected backend: {other:?}"),
        }

        config.storage.backend = StorageKind::Sqlite;
        match config.store_backend(&paths) {
            StoreBackend::Sqlite { path } => {
                assert_eq!(path, PathBuf::from("/tmp/data/agent0.db"))
            }
            other => panic!("unexpected backend: {other:?}"),
        }
    }

    #[test]
    fn test_parse_toml_config() {
        let raw = r#"
            [auth]
            domain = "tenant.us.auth0.com"
            client_id = "client123"
            audience = "https://agent0-api"

            [api]
            host = "https://api.example.com"

            [storage]
            backend = "sqlite"
        "#;

        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.auth.domain, "tenant.us.auth0.com");
        assert_eq!(config.auth.audience.as_deref(), Some("https://agent0-api"));
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
        assert!(config.validate().is_ok());
    }
}
