//! Shared fakes for unit tests.

use crate::api::SheetsApi;
use crate::db::{CredentialStore, SqliteCredentialStore};
use crate::error::{DeliveryError, TokenRequestError};
use crate::google_oauth::{TokenEndpoint, TokenGrant};
use crate::service::delivery::Delay;
use crate::types::credentials::{AccessToken, Credentials};
use crate::types::record::FormRecord;
use crate::types::sheets::{AppendValuesResponse, DeliveryTarget, UpdateValuesResponse};
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use futures::FutureExt;
use oauth2::{CsrfToken, PkceCodeChallenge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub fn sample_record(email: &str) -> FormRecord {
    FormRecord::new("2024-05-01 10:00", email, "Ana", "555-1234", "1", "Descuento 10%")
}

pub async fn temp_store(
    initial: Option<Credentials>,
) -> (Arc<SqliteCredentialStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("creds.sqlite").display());
    let store = SqliteCredentialStore::connect(&url).await.unwrap();
    if let Some(creds) = initial {
        store.put(&creds).await.unwrap();
    }
    (Arc::new(store), dir)
}

pub fn rate_limited() -> DeliveryError {
    DeliveryError::Api {
        status: StatusCode::TOO_MANY_REQUESTS,
        error: None,
    }
}

/// A [`Delay`] that returns immediately and remembers what it was asked to sleep.
pub fn recording_delay() -> (Delay, Arc<Mutex<Vec<Duration>>>) {
    let slept: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
    let log = slept.clone();
    let delay: Delay = Arc::new(move |d: Duration| {
        log.lock().unwrap().push(d);
        async {}.boxed()
    });
    (delay, slept)
}

type GrantFn = Box<dyn Fn() -> Result<TokenGrant, TokenRequestError> + Send + Sync>;

pub struct FakeTokenEndpoint {
    grant: GrantFn,
    refresh_calls: AtomicUsize,
    exchanged: Mutex<Vec<String>>,
}

impl Default for FakeTokenEndpoint {
    fn default() -> Self {
        Self::issuing("access", None)
    }
}

impl FakeTokenEndpoint {
    /// Grants an hour-long `access` token, plus `refresh` when given.
    pub fn issuing(access: &str, refresh: Option<&str>) -> Self {
        let access = access.to_owned();
        let refresh = refresh.map(str::to_owned);
        Self::with(Box::new(move || {
            Ok(TokenGrant {
                access_token: AccessToken::issued(
                    access.clone(),
                    Some(Duration::from_secs(3600)),
                    None,
                    Utc::now(),
                ),
                refresh_token: refresh.clone(),
            })
        }))
    }

    pub fn failing(err: fn() -> TokenRequestError) -> Self {
        Self::with(Box::new(move || Err(err())))
    }

    fn with(grant: GrantFn) -> Self {
        Self {
            grant,
            refresh_calls: AtomicUsize::new(0),
            exchanged: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn refresh(
        &self,
        _client: &Credentials,
        _refresh_token: &str,
    ) -> Result<TokenGrant, TokenRequestError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        (self.grant)()
    }

    async fn exchange_code(
        &self,
        _client: &Credentials,
        code: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, TokenRequestError> {
        self.exchanged.lock().unwrap().push(code.to_owned());
        (self.grant)()
    }

    fn authorize_url(&self, _client: &Credentials, _challenge: PkceCodeChallenge) -> (Url, CsrfToken) {
        let csrf = CsrfToken::new("fixed-state".to_owned());
        let url = Url::parse("https://accounts.example.com/auth?state=fixed-state").unwrap();
        (url, csrf)
    }
}

/// Plays back scripted outcomes (an `Ok` carries the `updatedRange`), then succeeds.
pub struct FakeSheetsApi {
    script: Mutex<VecDeque<Result<&'static str, DeliveryError>>>,
    calls: AtomicUsize,
}

impl FakeSheetsApi {
    pub fn scripted(script: Vec<Result<&'static str, DeliveryError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_ok() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SheetsApi for FakeSheetsApi {
    async fn append_row(
        &self,
        _access_token: &str,
        _target: &DeliveryTarget,
        _record: &FormRecord,
    ) -> Result<AppendValuesResponse, DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok("Lista!A2:F2"));
        next.map(|range| AppendValuesResponse {
            updates: Some(UpdateValuesResponse {
                updated_range: Some(range.to_owned()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
