use crate::error::{RelayError, StatusBody, ValidationError};
use crate::router::RelayState;
use crate::service::{FailureKind, FailureNotice};
use crate::types::record::{FormPayload, FormRecord};
use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::Method,
};
use tracing::{error, info, warn};

/// `/webhook`: store a form submission locally, then forward it to the sheet.
///
/// The backup row is written before any network call, so a 500 from here
/// still means the data is on disk.
pub async fn webhook(
    State(state): State<RelayState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<StatusBody>, RelayError> {
    if method != Method::POST {
        warn!(%method, "Rejected webhook with unsupported method");
        return Err(ValidationError::MethodNotAllowed(method).into());
    }

    // oversized bodies land here too; they get the same JSON reply as bad input
    let body = body.map_err(|rejection| {
        warn!(status = %rejection.status(), error = %rejection.body_text(), "Rejected unreadable webhook body");
        ValidationError::UnreadableBody(rejection.body_text())
    })?;

    let payload = FormPayload::parse(&body);
    if payload.is_empty() {
        warn!(bytes = body.len(), "Rejected webhook without form fields");
        return Err(ValidationError::EmptyPayload.into());
    }

    let record = FormRecord::from_payload(&payload);
    if record.is_blank() {
        warn!(keys = payload.len(), "Rejected webhook with no recognised field set");
        return Err(ValidationError::AllFieldsEmpty.into());
    }

    if let Err(e) = state.queue.append_backup(&record).await {
        error!(error = %e, email = record.email(), "Backup write failed, skipping delivery");
        return Err(e.into());
    }

    let client = match state.tokens.authorized_client().await {
        Ok(client) => client,
        Err(e) => {
            return Err(queue_and_notify(&state, &record, FailureKind::Authorization, e.into()).await);
        }
    };

    match state.delivery.append(&client, &record).await {
        Ok(row) => {
            info!(row = %row, email = record.email(), "Webhook delivered");
            Ok(Json(StatusBody::success(
                "Datos procesados y enviados a Google Sheets",
            )))
        }
        Err(e) => Err(queue_and_notify(&state, &record, FailureKind::Delivery, e.into()).await),
    }
}

/// Park the record in the pending queue and alert the administrator.
///
/// Neither a queue nor a notifier failure changes the reply: the record is
/// already in the backup log.
async fn queue_and_notify(
    state: &RelayState,
    record: &FormRecord,
    kind: FailureKind,
    err: RelayError,
) -> RelayError {
    error!(error = %err, ?kind, email = record.email(), "Delivery failed, queuing record");

    if let Err(e) = state.queue.enqueue_pending(record).await {
        error!(error = %e, email = record.email(), "Could not queue record; it remains in the backup log");
    }

    let notice = FailureNotice::new(kind, &err, &state.links);
    if let Err(e) = state.notifier.notify(&notice).await {
        warn!(error = %e, "Administrator notification failed");
    }
    err
}
