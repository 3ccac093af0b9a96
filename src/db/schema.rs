//! SQL DDL for initializing the credential storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `id` pinned to 1: the service holds exactly one authorization
/// - access token split into value / expiry / scope columns
/// - timestamps as RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    client_id TEXT NOT NULL,
    client_secret TEXT NOT NULL,
    access_token TEXT NULL,
    access_expiry TEXT NULL, -- RFC3339
    access_scope TEXT NULL,
    refresh_token TEXT NULL,
    updated_at TEXT NOT NULL -- RFC3339
);
"#;
