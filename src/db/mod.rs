//! Database module: persistent storage of the OAuth credential.
//!
//! Layout:
//! - `models.rs`: Rust struct mirroring the DB row and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the [`CredentialStore`] implementation over a `sqlx` pool

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::DbCredential;
pub use schema::SQLITE_INIT;
pub use sqlite::{SqliteCredentialStore, SqlitePool};

use crate::error::StorageError;
use crate::types::credentials::Credentials;
use async_trait::async_trait;

/// Durable home of the single [`Credentials`] record.
///
/// `put` replaces the whole record in one statement, so a concurrent `get`
/// observes either the old or the new value, never a mix.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<Credentials>, StorageError>;

    async fn put(&self, creds: &Credentials) -> Result<(), StorageError>;
}
