use crate::config::Config;
use crate::error::TokenRequestError;
use crate::types::credentials::{AccessToken, Credentials};

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use tracing::info;
use url::Url;

/// Tokens returned by a successful grant.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    /// Only present when the provider chose to (re)issue one.
    pub refresh_token: Option<String>,
}

/// Remote side of the OAuth2 lifecycle.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Mint a new access token from a refresh token.
    async fn refresh(
        &self,
        client: &Credentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, TokenRequestError>;

    /// Redeem an authorization code from the consent redirect.
    async fn exchange_code(
        &self,
        client: &Credentials,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, TokenRequestError>;

    /// Consent-page URL for an offline-access authorization.
    fn authorize_url(&self, client: &Credentials, challenge: PkceCodeChallenge) -> (Url, CsrfToken);
}

/// Google OAuth2 endpoints driven by the `oauth2` crate.
pub struct GoogleOauthEndpoints {
    http: reqwest::Client,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
}

impl GoogleOauthEndpoints {
    pub fn new(cfg: &Config, http: reqwest::Client) -> Result<Self, TokenRequestError> {
        Ok(Self {
            http,
            auth_url: AuthUrl::from_url(cfg.google.auth_url.clone()),
            token_url: TokenUrl::from_url(cfg.google.token_url.clone()),
            redirect_url: RedirectUrl::from_url(cfg.callback_url()?),
            scopes: cfg.google.scopes.clone(),
        })
    }

    /// Build the Google OAuth2 client from credentials.
    fn build_oauth2_client(&self, creds: &Credentials) -> GoogleOauth2Client {
        OAuth2Client::new(ClientId::new(creds.client_id.clone()))
            .set_client_secret(ClientSecret::new(creds.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }
}

#[async_trait]
impl TokenEndpoint for GoogleOauthEndpoints {
    async fn refresh(
        &self,
        client: &Credentials,
        refresh_token: &str,
    ) -> Result<TokenGrant, TokenRequestError> {
        let oauth = self.build_oauth2_client(client);
        let token_result = oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_owned()))
            .request_async(&self.http)
            .await?;
        info!(client_id = %client.client_id, "Access token refreshed successfully");
        Ok(into_grant(&token_result))
    }

    async fn exchange_code(
        &self,
        client: &Credentials,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, TokenRequestError> {
        let oauth = self.build_oauth2_client(client);
        let mut request = oauth.exchange_code(AuthorizationCode::new(code.to_owned()));
        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
        }
        let token_result = request.request_async(&self.http).await?;
        info!(
            client_id = %client.client_id,
            refresh_token_issued = token_result.refresh_token().is_some(),
            "Authorization code exchanged successfully"
        );
        Ok(into_grant(&token_result))
    }

    fn authorize_url(&self, client: &Credentials, challenge: PkceCodeChallenge) -> (Url, CsrfToken) {
        let oauth = self.build_oauth2_client(client);
        // offline + consent makes Google issue a refresh token on every authorization
        let mut request = oauth
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        request.url()
    }
}

fn into_grant(resp: &BasicTokenResponse) -> TokenGrant {
    let scope = resp.scopes().map(|scopes| {
        scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    });
    TokenGrant {
        access_token: AccessToken::issued(
            resp.access_token().secret().clone(),
            resp.expires_in(),
            scope,
            Utc::now(),
        ),
        refresh_token: resp.refresh_token().map(|t| t.secret().clone()),
    }
}

pub(super) type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
