use axum::{
    Json,
    http::{Method, StatusCode},
    response::IntoResponse,
};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Rejections caused by the submitter's request itself. Never retried.
#[derive(Debug, ThisError)]
pub enum ValidationError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("invalid or empty payload")]
    EmptyPayload,

    #[error("all mapped fields are empty")]
    AllFieldsEmpty,

    #[error("request body could not be read: {0}")]
    UnreadableBody(String),
}

impl ValidationError {
    pub fn status(&self) -> StatusCode {
        match self {
            ValidationError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ValidationError::EmptyPayload
            | ValidationError::AllFieldsEmpty
            | ValidationError::UnreadableBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ValidationError::MethodNotAllowed(_) => "Método no permitido",
            ValidationError::EmptyPayload | ValidationError::UnreadableBody(_) => {
                "Datos inválidos o vacíos"
            }
            ValidationError::AllFieldsEmpty => "Todos los campos están vacíos",
        }
    }
}

/// Local persistence failures: log files and the credential database.
#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| StorageError::Io { path, source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>) -> impl FnOnce(csv::Error) -> Self {
        let path = path.into();
        move |source| StorageError::Csv { path, source }
    }
}

/// Failures talking to the OAuth2 token endpoint.
#[derive(Debug, ThisError)]
pub enum TokenRequestError {
    #[error("OAuth2 server error: {error}")]
    Server {
        error: String,
        description: Option<String>,
    },

    #[error("OAuth2 token request error: {0}")]
    Request(String),

    #[error("OAuth2 token response could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("OAuth2 endpoint URL is invalid: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for TokenRequestError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => TokenRequestError::Server {
                error: err.error().to_string(),
                description: err.error_description().cloned(),
            },
            RequestTokenError::Request(req_e) => {
                TokenRequestError::Request(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                TokenRequestError::Parse(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => TokenRequestError::Request(s),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum AuthError {
    #[error("no usable access token; authorization required")]
    Unauthorized,

    #[error("OAuth client id/secret are not configured")]
    NotConfigured,

    #[error("access token refresh failed: {0}")]
    RefreshFailed(#[source] TokenRequestError),

    #[error("authorization code exchange failed: {0}")]
    CodeExchange(#[source] TokenRequestError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of the remote append call.
#[derive(Debug, ThisError)]
pub enum DeliveryError {
    #[error("Sheets API error with status {status}: {}", api_message(.error))]
    Api {
        status: StatusCode,
        error: Option<GoogleApiError>,
    },

    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid delivery target: {0}")]
    InvalidTarget(String),
}

fn api_message(error: &Option<GoogleApiError>) -> &str {
    error
        .as_ref()
        .map(|e| e.error.message.as_str())
        .unwrap_or("<no body>")
}

impl DeliveryError {
    /// Quota exhaustion, the only failure eligible for automatic retry.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            DeliveryError::Api { status, error } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || error
                        .as_ref()
                        .is_some_and(|e| e.error.status == "RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Ways the consent redirect can fail to produce a usable authorization.
#[derive(Debug, ThisError)]
pub enum OauthFlowError {
    #[error("consent was not granted: {0}")]
    Denied(String),

    #[error("OAuth session cookie missing: {0}")]
    MissingSession(&'static str),

    #[error("missing `{0}` in callback")]
    MissingParam(&'static str),

    #[error("CSRF token mismatch")]
    StateMismatch,

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Top-level error for request handlers; every variant maps to a JSON status body.
#[derive(Debug, ThisError)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Starting consent from the admin surface; no form data is involved.
    #[error("authorization setup failed: {0}")]
    Admin(#[source] AuthError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            RelayError::Validation(v) => (v.status(), v.public_message()),
            RelayError::Auth(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error de autorización, datos guardados localmente",
            ),
            RelayError::Delivery(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al procesar los datos, guardados localmente",
            ),
            RelayError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error al guardar los datos localmente",
            ),
            RelayError::Admin(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No se pudo iniciar la autorización con Google, revise el cliente OAuth",
            ),
        };
        (status, Json(StatusBody::error(message))).into_response()
    }
}

/// Response body shared by every webhook outcome.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
}

impl StatusBody {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Google API error response structure
#[derive(Deserialize, Debug, Clone)]
pub struct GoogleApiError {
    pub error: GoogleApiErrorBody,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GoogleApiErrorBody {
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: StatusCode, google_status: &str) -> DeliveryError {
        let body = serde_json::json!({
            "error": { "code": status.as_u16(), "message": "quota", "status": google_status }
        });
        DeliveryError::Api {
            status,
            error: Some(serde_json::from_value(body).unwrap()),
        }
    }

    #[test]
    fn rate_limit_detection_uses_status_code_or_google_status() {
        assert!(api_error(StatusCode::TOO_MANY_REQUESTS, "").is_rate_limited());
        assert!(api_error(StatusCode::FORBIDDEN, "RESOURCE_EXHAUSTED").is_rate_limited());
        assert!(!api_error(StatusCode::FORBIDDEN, "PERMISSION_DENIED").is_rate_limited());
        assert!(!DeliveryError::InvalidTarget("x".into()).is_rate_limited());
    }

    #[test]
    fn validation_errors_map_to_client_statuses() {
        assert_eq!(
            ValidationError::MethodNotAllowed(Method::GET).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(ValidationError::EmptyPayload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ValidationError::AllFieldsEmpty.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
