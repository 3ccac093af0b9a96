use super::endpoints::TokenEndpoint;
use crate::db::CredentialStore;
use crate::error::AuthError;
use crate::types::credentials::{AuthStatus, AuthorizedClient, Credentials};

use oauth2::{CsrfToken, PkceCodeChallenge};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Keeps a usable access token available, refreshing and persisting as needed.
///
/// Concurrent refreshes are not coalesced: each caller that finds the token
/// expired refreshes on its own and the last `put` wins.
pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self { store, endpoint }
    }

    /// Load the stored credentials and make sure their access token is usable.
    pub async fn authorized_client(&self) -> Result<AuthorizedClient, AuthError> {
        let creds = self.store.get().await?.ok_or(AuthError::Unauthorized)?;
        self.ensure_valid(creds).await
    }

    pub async fn ensure_valid(&self, creds: Credentials) -> Result<AuthorizedClient, AuthError> {
        let Some(token) = creds.access_token.as_ref() else {
            warn!("No access token stored; authorization required");
            return Err(AuthError::Unauthorized);
        };

        if !token.is_expired() {
            debug!("Access token still valid");
            return Ok(AuthorizedClient::new(token.value.clone()));
        }

        let Some(refresh_token) = creds.refresh_token.as_deref() else {
            warn!("Access token expired and no refresh token is stored");
            return Err(AuthError::Unauthorized);
        };

        info!("Access token expired, refreshing");
        let grant = self
            .endpoint
            .refresh(&creds, refresh_token)
            .await
            .map_err(|e| {
                // the stale token stays in storage for diagnostics
                error!(error = %e, "Access token refresh failed");
                AuthError::RefreshFailed(e)
            })?;

        let value = grant.access_token.value.clone();
        let refresh_token = grant.refresh_token.or(creds.refresh_token);
        let renewed = Credentials {
            access_token: Some(grant.access_token),
            refresh_token,
            ..creds
        };
        self.store.put(&renewed).await?;
        info!("Access token refreshed and persisted");
        Ok(AuthorizedClient::new(value))
    }

    /// Redeem an authorization code and persist the resulting tokens.
    ///
    /// A refresh token absent from the response leaves the stored one in place.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<Credentials, AuthError> {
        let current = self.configured_client().await?;
        let grant = self
            .endpoint
            .exchange_code(&current, code, pkce_verifier)
            .await
            .map_err(AuthError::CodeExchange)?;

        if grant.refresh_token.is_none() {
            warn!("Token response carried no refresh_token; keeping the stored one");
        }
        let refresh_token = grant.refresh_token.or(current.refresh_token);
        let updated = Credentials {
            access_token: Some(grant.access_token),
            refresh_token,
            ..current
        };
        self.store.put(&updated).await?;
        info!("Access and refresh tokens stored");
        Ok(updated)
    }

    pub async fn authorize_url(
        &self,
        challenge: PkceCodeChallenge,
    ) -> Result<(Url, CsrfToken), AuthError> {
        let client = self.configured_client().await?;
        Ok(self.endpoint.authorize_url(&client, challenge))
    }

    /// Whether webhooks can currently be delivered, refreshing if that is what it takes.
    pub async fn authorization_status(&self) -> AuthStatus {
        match self.authorized_client().await {
            Ok(_) => AuthStatus::Authorized,
            Err(e) => {
                debug!(error = %e, "Authorization check failed");
                AuthStatus::NeedsReauthorization
            }
        }
    }

    async fn configured_client(&self) -> Result<Credentials, AuthError> {
        self.store
            .get()
            .await?
            .filter(Credentials::is_client_configured)
            .ok_or(AuthError::NotConfigured)
    }
}
