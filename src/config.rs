//! Layered service configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `config.toml` (or the file named by `RELAY_CONFIG`)
//! 3. environment variables prefixed `RELAY_`, sections split on `__`
//!    (e.g. `RELAY_GOOGLE__CLIENT_SECRET`)
//!
//! The loaded [`Config`] is handed to constructors explicitly; nothing in the
//! request path reads configuration from a global.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub google: GoogleConfig,
    pub sheet: SheetConfig,
    pub delivery: DeliveryConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    /// Shared secret for the admin endpoints. Empty disables them.
    pub admin_key: String,
    /// Externally reachable base URL; used for the OAuth redirect and notification links.
    pub public_base_url: Url,
    /// Where the OAuth callback sends the browser once it is done.
    pub config_page_url: String,
    pub database_url: String,
    /// Directory holding the backup and pending CSV files.
    pub data_dir: PathBuf,
    pub insecure_cookie: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            loglevel: "info".to_string(),
            admin_key: String::new(),
            public_base_url: Url::parse("http://127.0.0.1:8080/").expect("static url"),
            config_page_url: "/admin/status".to_string(),
            database_url: "sqlite:data/relay.sqlite".to_string(),
            data_dir: PathBuf::from("data"),
            insecure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: Url,
    pub token_url: Url,
    pub sheets_api_base: Url,
    pub scopes: Vec<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: Url::parse(GOOGLE_AUTH_URL).expect("static url"),
            token_url: Url::parse(GOOGLE_TOKEN_URL).expect("static url"),
            sheets_api_base: Url::parse(SHEETS_API_BASE).expect("static url"),
            scopes: vec![SHEETS_SCOPE.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub column_range: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Lista".to_string(),
            column_range: "A:F".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Total append calls per record, first attempt included.
    pub max_attempts: u32,
    /// Backoff before retry n is `base_delay_ms * 2^n`.
    pub base_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Pacing for backlog drains, in appends per minute.
    pub drain_per_minute: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            drain_per_minute: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Incoming-webhook URL (Chat/Slack style) for failure alerts; logs only when unset.
    pub webhook_url: Option<Url>,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::figment(&path).extract()
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("RELAY_").split("__"))
    }

    /// Redirect URI registered with Google for the authorization-code flow.
    pub fn callback_url(&self) -> Result<Url, url::ParseError> {
        self.basic.public_base_url.join("oauth/callback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.delivery.max_attempts, 3);
        assert_eq!(cfg.sheet.column_range, "A:F");
        assert_eq!(cfg.google.scopes, vec![SHEETS_SCOPE.to_string()]);
        assert_eq!(
            cfg.callback_url().unwrap().as_str(),
            "http://127.0.0.1:8080/oauth/callback"
        );
    }

    #[test]
    fn toml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "relay.toml",
                r#"
                [sheet]
                spreadsheet_id = "sheet-123"

                [delivery]
                max_attempts = 5
                "#,
            )?;
            jail.set_env("RELAY_SHEET__SHEET_NAME", "Respuestas");

            let cfg: Config = Config::figment("relay.toml").extract()?;
            assert_eq!(cfg.sheet.spreadsheet_id, "sheet-123");
            assert_eq!(cfg.sheet.sheet_name, "Respuestas");
            assert_eq!(cfg.delivery.max_attempts, 5);
            assert_eq!(cfg.delivery.base_delay_ms, 1000);
            Ok(())
        });
    }
}
