//! Inbound client authentication: the shared secret may arrive as a Bearer
//! token, Basic password, `key` query parameter, or `x-goog-api-key`
//! header, per `spec.md` §4.5. Grounded in the teacher's
//! `server::guards::auth::RequireKeyAuth`, extended with the Basic and
//! query-parameter forms this surface's native Gemini clients use.

use super::state::AppState;
use crate::error::ProxyError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::{Basic, Bearer};
use axum_extra::headers::{Authorization, HeaderMapExt};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy)]
pub struct RequireAuth;

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ProxyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.gemini_auth_password.as_bytes();
        let candidates = candidate_secrets(parts);

        if candidates
            .iter()
            .any(|candidate| candidate.as_bytes().ct_eq(expected).into())
        {
            Ok(RequireAuth)
        } else {
            Err(ProxyError::Unauthorized)
        }
    }
}

fn candidate_secrets(parts: &Parts) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(bearer) = parts.headers.typed_get::<Authorization<Bearer>>() {
        candidates.push(bearer.token().to_string());
    }
    if let Some(basic) = parts.headers.typed_get::<Authorization<Basic>>() {
        candidates.push(basic.password().to_string());
    }
    if let Some(query) = parts.uri.query() {
        if let Some((_, value)) = url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == "key")
        {
            candidates.push(value.into_owned());
        }
    }
    if let Some(header) = parts.headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        candidates.push(header.to_string());
    }

    candidates
}
