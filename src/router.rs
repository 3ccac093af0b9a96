use crate::config::Config;
use crate::google_oauth::TokenManager;
use crate::handlers::{admin, google_oauth, webhook};
use crate::service::{DurableQueue, NoticeLinks, Notifier, ReauthorizationFlow, SheetsDeliveryClient};
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{any, get};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;

/// Form submissions are a handful of short fields.
const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct RelayState {
    pub tokens: Arc<TokenManager>,
    pub queue: Arc<DurableQueue>,
    pub delivery: Arc<SheetsDeliveryClient>,
    pub reauth: Arc<ReauthorizationFlow>,
    pub notifier: Arc<dyn Notifier>,
    pub links: Arc<NoticeLinks>,
    pub admin_key: Arc<str>,
    pub config_page_url: Arc<str>,
    pub insecure_cookie: bool,
    cookie_key: Key,
}

impl RelayState {
    pub fn new(
        tokens: Arc<TokenManager>,
        queue: Arc<DurableQueue>,
        delivery: Arc<SheetsDeliveryClient>,
        notifier: Arc<dyn Notifier>,
        cfg: &Config,
    ) -> Result<Self, url::ParseError> {
        let reauth = Arc::new(ReauthorizationFlow::new(
            tokens.clone(),
            queue.clone(),
            delivery.clone(),
            &cfg.delivery,
        ));
        Ok(Self {
            tokens,
            queue,
            delivery,
            reauth,
            notifier,
            links: Arc::new(NoticeLinks::from_base(&cfg.basic.public_base_url)?),
            admin_key: Arc::from(cfg.basic.admin_key.as_str()),
            config_page_url: Arc::from(cfg.basic.config_page_url.as_str()),
            insecure_cookie: cfg.basic.insecure_cookie,
            // OAuth cookies only need to outlive one consent round-trip
            cookie_key: Key::generate(),
        })
    }
}

impl FromRef<RelayState> for Key {
    fn from_ref(state: &RelayState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/webhook", any(webhook::webhook))
        .route("/oauth/callback", get(google_oauth::google_oauth_callback))
        .route("/admin/authorize", get(google_oauth::google_oauth_entry))
        .route("/admin/status", get(admin::status))
        .route("/admin/files/backup", get(admin::backup_file))
        .route("/admin/files/pending", get(admin::pending_file))
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
        .with_state(state)
}
