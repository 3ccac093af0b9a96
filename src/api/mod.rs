pub mod sheets_api;

pub use sheets_api::{GoogleSheetsApi, SheetsApi};

use crate::config::DeliveryConfig;
use std::time::Duration;

/// Shared outbound client for the token endpoint, Sheets and notifications.
pub fn build_http_client(cfg: &DeliveryConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        // token endpoint responses must not be followed anywhere (SSRF)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}
