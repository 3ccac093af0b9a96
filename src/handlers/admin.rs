use crate::error::{RelayError, StorageError};
use crate::middleware::RequireKeyAuth;
use crate::router::RelayState;
use crate::types::credentials::AuthStatus;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub authorized: bool,
    pub pending: usize,
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

/// GET /admin/status
pub async fn status(
    _auth: RequireKeyAuth,
    State(state): State<RelayState>,
) -> Result<Json<StatusReport>, RelayError> {
    let authorized = state.tokens.authorization_status().await == AuthStatus::Authorized;
    let target = state.delivery.target();
    Ok(Json(StatusReport {
        authorized,
        pending: state.queue.pending_len().await?,
        spreadsheet_id: target.spreadsheet_id.clone(),
        sheet_name: target.sheet_name.clone(),
    }))
}

/// GET /admin/files/backup
pub async fn backup_file(
    _auth: RequireKeyAuth,
    State(state): State<RelayState>,
) -> Result<Response, RelayError> {
    csv_download(state.queue.backup_path()).await
}

/// GET /admin/files/pending
pub async fn pending_file(
    _auth: RequireKeyAuth,
    State(state): State<RelayState>,
) -> Result<Response, RelayError> {
    csv_download(state.queue.pending_path()).await
}

async fn csv_download(path: &Path) -> Result<Response, RelayError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) => return Err(StorageError::io(path)(e).into()),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data.csv".to_string());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
