use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens are treated as expired this long before their stated expiry.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Opaque access token as issued by the provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    /// `None` means the provider did not state a lifetime.
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl AccessToken {
    /// Build from a token response received at `now`.
    pub fn issued(
        value: impl Into<String>,
        expires_in: Option<std::time::Duration>,
        scope: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = expires_in
            .and_then(|d| TimeDelta::from_std(d).ok())
            .map(|d| now + d);
        Self {
            value: value.into(),
            expires_at,
            scope,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + TimeDelta::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth2 client registration plus the tokens obtained for it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<AccessToken>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            access_token: None,
            refresh_token: None,
        }
    }

    pub fn is_client_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A bearer credential known to be unexpired when handed out.
#[derive(Clone)]
pub struct AuthorizedClient {
    access_token: String,
}

impl AuthorizedClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizedClient(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authorized,
    NeedsReauthorization,
}
