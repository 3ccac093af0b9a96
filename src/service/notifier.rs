use crate::error::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::fmt::Display;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authorization,
    Delivery,
}

/// Admin-facing URLs included in every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeLinks {
    pub pending_url: Url,
    pub backup_url: Url,
    pub reauthorize_url: Url,
}

impl NoticeLinks {
    pub fn from_base(base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            pending_url: base.join("admin/files/pending")?,
            backup_url: base.join("admin/files/backup")?,
            reauthorize_url: base.join("admin/authorize")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureNotice {
    pub kind: FailureKind,
    pub error: String,
    pub pending_url: Url,
    pub backup_url: Url,
    pub reauthorize_url: Url,
    pub occurred_at: DateTime<Utc>,
}

impl FailureNotice {
    pub fn new(kind: FailureKind, error: impl Display, links: &NoticeLinks) -> Self {
        Self {
            kind,
            error: error.to_string(),
            pending_url: links.pending_url.clone(),
            backup_url: links.backup_url.clone(),
            reauthorize_url: links.reauthorize_url.clone(),
            occurred_at: Utc::now(),
        }
    }

    /// Plain-text body for chat-style webhooks.
    pub fn text(&self) -> String {
        let (subject, headline) = match self.kind {
            FailureKind::Authorization => (
                "Acción requerida: Reautorizar con Google Sheets",
                "La autorización con Google Sheets ha expirado. Reautoriza el servicio",
            ),
            FailureKind::Delivery => (
                "Acción requerida: Revisar envíos a Google Sheets",
                "No se pudo enviar un registro a Google Sheets. Si el problema persiste, reautoriza",
            ),
        };
        format!(
            "{subject}\n\
             {headline}: {reauth}\n\
             Hay datos pendientes de envío; se procesarán después de la reautorización.\n\
             Datos pendientes: {pending}\n\
             Respaldo general: {backup}\n\
             Error: {error}",
            reauth = self.reauthorize_url,
            pending = self.pending_url,
            backup = self.backup_url,
            error = self.error,
        )
    }
}

/// Alerts the administrator about a submission that could not be delivered.
///
/// Invoked once per failing request; a backlog of failures produces one alert each.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), NotifyError>;
}

/// Emits alerts to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), NotifyError> {
        warn!(
            kind = ?notice.kind,
            error = %notice.error,
            pending = %notice.pending_url,
            backup = %notice.backup_url,
            reauthorize = %notice.reauthorize_url,
            "Administrator action required"
        );
        Ok(())
    }
}

/// Posts alerts as JSON to an incoming-webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &FailureNotice) -> Result<(), NotifyError> {
        self.client
            .post(self.url.clone())
            .json(&json!({ "text": notice.text(), "notice": notice }))
            .send()
            .await?
            .error_for_status()?;
        info!(kind = ?notice.kind, "Administrator notification sent");
        Ok(())
    }
}
