use crate::error::{OauthFlowError, RelayError};
use crate::middleware::RequireKeyAuth;
use crate::router::RelayState;
use crate::service::DrainReport;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::{CsrfToken, PkceCodeChallenge};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declines consent.
    pub error: Option<String>,
}

const CSRF_COOKIE: &str = "relay_oauth_state";
const PKCE_COOKIE: &str = "relay_oauth_pkce";

/// GET /admin/authorize -> redirects to Google's consent page.
pub async fn google_oauth_entry(
    _auth: RequireKeyAuth,
    State(state): State<RelayState>,
    jar: PrivateCookieJar,
) -> Result<Response, RelayError> {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf_token) = state
        .tokens
        .authorize_url(challenge)
        .await
        .map_err(RelayError::Admin)?;

    let jar = store_oauth_cookies(jar, &csrf_token, verifier.secret(), !state.insecure_cookie);

    info!("Dispatching OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())).into_response())
}

/// GET /oauth/callback -> exchanges the code, drains the backlog, and sends the
/// browser back to the configuration page whatever happened.
pub async fn google_oauth_callback(
    State(state): State<RelayState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (jar, outcome) = complete_authorization(&state, query, jar).await;
    match outcome {
        Ok(report) => info!(
            drained = report.succeeded,
            still_pending = report.failed,
            "OAuth callback completed"
        ),
        Err(e) => warn!(error = %e, "OAuth callback did not complete; state left unchanged"),
    }
    (jar, Redirect::to(&state.config_page_url)).into_response()
}

async fn complete_authorization(
    state: &RelayState,
    query: AuthCallbackQuery,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Result<DrainReport, OauthFlowError>) {
    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return (jar, Err(err)),
    };

    if let Some(denied) = query.error {
        return (jar, Err(OauthFlowError::Denied(denied)));
    }

    let Some(state_param) = query.state.as_deref() else {
        return (jar, Err(OauthFlowError::MissingParam("state")));
    };
    if !bool::from(state_param.as_bytes().ct_eq(csrf_cookie.as_bytes())) {
        return (jar, Err(OauthFlowError::StateMismatch));
    }

    let Some(code) = query.code.as_deref() else {
        return (jar, Err(OauthFlowError::MissingParam("code")));
    };

    let outcome = state
        .reauth
        .handle_code(code, Some(&pkce_verifier))
        .await
        .map_err(OauthFlowError::from);
    (jar, outcome)
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    csrf: &CsrfToken,
    pkce_verifier: &str,
    secure: bool,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string(), secure))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.to_string(), secure))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, OauthFlowError)> {
    let csrf_cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned());
    let pkce_cookie = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned());
    let jar = clear_oauth_cookies(jar);

    let Some(csrf_cookie) = csrf_cookie else {
        return Err((jar, OauthFlowError::MissingSession("CSRF state")));
    };
    let Some(pkce_cookie) = pkce_cookie else {
        return Err((jar, OauthFlowError::MissingSession("PKCE verifier")));
    };
    Ok((pkce_cookie, csrf_cookie, jar))
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn build_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
