use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::StatusBody;
use crate::router::RelayState;

const KEY_HEADER: &str = "x-relay-key";

fn key_matches(candidate: &str, expected: &str) -> bool {
    bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// Ensure the inbound admin request carries the configured key.
/// Accepts either:
/// - Header: `x-relay-key: ...`
/// - Header: `Authorization: Bearer ...`
/// - Query string: `?key=...`
///
/// An empty `expected` key rejects everything.
pub fn ensure_authorized(
    headers: &HeaderMap,
    query: Option<&str>,
    expected: &str,
) -> Result<(), Response> {
    if !expected.is_empty() {
        // 1) header: x-relay-key
        if let Some(hv) = headers.get(KEY_HEADER).and_then(|v| v.to_str().ok())
            && key_matches(hv, expected)
        {
            return Ok(());
        }

        // 2) header: Authorization: Bearer <key>
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            let auth = auth.trim();
            if let Some(token) = auth
                .strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
                && key_matches(token, expected)
            {
                return Ok(());
            }
        }

        // 3) query: key=...
        if let Some(qs) = query {
            for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
                if k == "key" && key_matches(&v, expected) {
                    return Ok(());
                }
            }
        }
    }

    warn!("Rejected admin request with invalid or missing key");
    Err((
        StatusCode::UNAUTHORIZED,
        Json(StatusBody::error("No autorizado")),
    )
        .into_response())
}

#[derive(Debug, Clone, Copy)]
pub struct RequireKeyAuth;

impl FromRequestParts<RelayState> for RequireKeyAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        ensure_authorized(&parts.headers, parts.uri.query(), &state.admin_key)?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn accepts_header_bearer_or_query_key() {
        let mut headers = HeaderMap::new();
        headers.insert(KEY_HEADER, HeaderValue::from_static("s3cret"));
        assert!(ensure_authorized(&headers, None, "s3cret").is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(ensure_authorized(&headers, None, "s3cret").is_ok());

        assert!(ensure_authorized(&HeaderMap::new(), Some("a=1&key=s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn rejects_wrong_missing_or_unconfigured_key() {
        let mut headers = HeaderMap::new();
        headers.insert(KEY_HEADER, HeaderValue::from_static("nope"));
        let resp = ensure_authorized(&headers, None, "s3cret").unwrap_err();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        assert!(ensure_authorized(&HeaderMap::new(), None, "s3cret").is_err());
        // empty configured key must not match an empty `?key=`
        assert!(ensure_authorized(&HeaderMap::new(), Some("key="), "").is_err());
    }
}
