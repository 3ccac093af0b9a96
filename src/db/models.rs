use crate::types::credentials::{AccessToken, Credentials};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct DbCredential {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<String>,
    pub access_expiry: Option<DateTime<Utc>>,
    pub access_scope: Option<String>,
    pub refresh_token: Option<String>,
}

impl From<&Credentials> for DbCredential {
    fn from(c: &Credentials) -> Self {
        let token = c.access_token.as_ref();
        Self {
            client_id: c.client_id.clone(),
            client_secret: c.client_secret.clone(),
            access_token: token.map(|t| t.value.clone()),
            access_expiry: token.and_then(|t| t.expires_at),
            access_scope: token.and_then(|t| t.scope.clone()),
            refresh_token: c.refresh_token.clone(),
        }
    }
}

impl From<DbCredential> for Credentials {
    fn from(d: DbCredential) -> Self {
        let access_token = d.access_token.map(|value| AccessToken {
            value,
            expires_at: d.access_expiry,
            scope: d.access_scope,
        });
        Credentials {
            client_id: d.client_id,
            client_secret: d.client_secret,
            access_token,
            refresh_token: d.refresh_token,
        }
    }
}
