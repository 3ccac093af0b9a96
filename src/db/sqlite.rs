use crate::db::CredentialStore;
use crate::db::models::DbCredential;
use crate::db::schema::SQLITE_INIT;
use crate::error::StorageError;
use crate::types::credentials::Credentials;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Record the configured OAuth client. Stored tokens survive when the
    /// client id is unchanged and are dropped when it changes, since they
    /// cannot be refreshed under a different client.
    pub async fn seed_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO credentials (id, client_id, client_secret, updated_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = CASE WHEN credentials.client_id = excluded.client_id
                    THEN credentials.access_token ELSE NULL END,
                access_expiry = CASE WHEN credentials.client_id = excluded.client_id
                    THEN credentials.access_expiry ELSE NULL END,
                access_scope = CASE WHEN credentials.client_id = excluded.client_id
                    THEN credentials.access_scope ELSE NULL END,
                refresh_token = CASE WHEN credentials.client_id = excluded.client_id
                    THEN credentials.refresh_token ELSE NULL END,
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(client_id)
        .bind(client_secret)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        info!(
            client_id,
            rows = result.rows_affected(),
            "OAuth client configuration stored"
        );
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<DbCredential, StorageError> {
        let client_id: String = row.try_get("client_id")?;
        let client_secret: String = row.try_get("client_secret")?;
        let access_token: Option<String> = row.try_get("access_token")?;
        let expiry_str: Option<String> = row.try_get("access_expiry")?;
        let access_scope: Option<String> = row.try_get("access_scope")?;
        let refresh_token: Option<String> = row.try_get("refresh_token")?;

        let access_expiry = expiry_str
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))
            })
            .transpose()?;

        Ok(DbCredential {
            client_id,
            client_secret,
            access_token,
            access_expiry,
            access_scope,
            refresh_token,
        })
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self) -> Result<Option<Credentials>, StorageError> {
        let row = sqlx::query(
            r#"SELECT client_id, client_secret, access_token, access_expiry,
               access_scope, refresh_token
               FROM credentials WHERE id = 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model)
            .transpose()
            .map(|m| m.map(Credentials::from))
    }

    async fn put(&self, creds: &Credentials) -> Result<(), StorageError> {
        let row = DbCredential::from(creds);
        sqlx::query(
            r#"
            INSERT INTO credentials (
                id, client_id, client_secret, access_token, access_expiry,
                access_scope, refresh_token, updated_at
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                client_id=excluded.client_id,
                client_secret=excluded.client_secret,
                access_token=excluded.access_token,
                access_expiry=excluded.access_expiry,
                access_scope=excluded.access_scope,
                refresh_token=excluded.refresh_token,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(row.client_id)
        .bind(row.client_secret)
        .bind(row.access_token)
        .bind(row.access_expiry.map(|e| e.to_rfc3339()))
        .bind(row.access_scope)
        .bind(row.refresh_token)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!("credentials persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::credentials::AccessToken;
    use chrono::TimeDelta;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteCredentialStore {
        let url = format!("sqlite:{}", dir.path().join("creds.sqlite").display());
        SqliteCredentialStore::connect(&url).await.unwrap()
    }

    fn authorized(client_id: &str) -> Credentials {
        let mut creds = Credentials::new(client_id, "secret");
        creds.access_token = Some(AccessToken {
            value: "access-1".into(),
            expires_at: Some(Utc::now() + TimeDelta::hours(1)),
            scope: Some("https://www.googleapis.com/auth/spreadsheets".into()),
        });
        creds.refresh_token = Some("refresh-1".into());
        creds
    }

    #[tokio::test]
    async fn empty_store_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_returns_same_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let creds = authorized("client");

        store.put(&creds).await.unwrap();
        let loaded = store.get().await.unwrap().unwrap();

        assert_eq!(loaded.client_id, "client");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh-1"));
        let token = loaded.access_token.unwrap();
        assert_eq!(token.value, "access-1");
        // RFC3339 keeps sub-second precision
        assert_eq!(token.expires_at, creds.access_token.unwrap().expires_at);
    }

    #[tokio::test]
    async fn put_replaces_access_token_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.put(&authorized("client")).await.unwrap();

        let mut next = authorized("client");
        next.access_token = Some(AccessToken {
            value: "access-2".into(),
            expires_at: None,
            scope: None,
        });
        store.put(&next).await.unwrap();

        let token = store.get().await.unwrap().unwrap().access_token.unwrap();
        assert_eq!(token.value, "access-2");
        assert_eq!(token.expires_at, None);
        assert_eq!(token.scope, None);
    }

    #[tokio::test]
    async fn seed_client_keeps_tokens_for_same_client() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.put(&authorized("client")).await.unwrap();

        store.seed_client("client", "rotated-secret").await.unwrap();

        let loaded = store.get().await.unwrap().unwrap();
        assert_eq!(loaded.client_secret, "rotated-secret");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh-1"));
        assert!(loaded.access_token.is_some());
    }

    #[tokio::test]
    async fn seed_client_drops_tokens_when_client_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.put(&authorized("old-client")).await.unwrap();

        store.seed_client("new-client", "s").await.unwrap();

        let loaded = store.get().await.unwrap().unwrap();
        assert_eq!(loaded.client_id, "new-client");
        assert!(loaded.access_token.is_none());
        assert!(loaded.refresh_token.is_none());
    }
}
