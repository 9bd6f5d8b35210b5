//! Chat persistence layer.
//!
//! Provides a trait-based storage abstraction with implementations for:
//! - Local JSON-file storage (offline/demo)
//! - SQLite storage via sqlx (server-backed deployments)
//!
//! The backend is selected once at composition time; call sites only see
//! the [`ChatStore`] trait.

mod db;
mod error;
mod local;
mod models;
mod sqlite;
mod traits;

use std::path::PathBuf;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use models::{Chat, Message, MessageRole, NewMessage, DEFAULT_CHAT_TITLE};
pub use sqlite::SqliteStore;
pub use traits::ChatStore;

/// Create a chat store based on configuration.
pub async fn create_store(config: &StoreBackend) -> StoreResult<Box<dyn ChatStore>> {
    match config {
        StoreBackend::Local { dir } => Ok(Box::new(LocalStore::new(dir))),
        StoreBackend::Sqlite { path } => {
            let db = Database::open(path).await?;
            Ok(Box::new(SqliteStore::new(db)))
        }
    }
}

/// Chat store backend selection.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// JSON files under a local directory.
    Local { dir: PathBuf },
    /// SQLite database file.
    Sqlite { path: PathBuf },
}
