//! Error taxonomy for the proxy, mirrored on the OpenAI error envelope shape
//! clients already expect from `/v1/chat/completions`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Top-level error type returned by every handler and pipeline stage.
#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("missing or invalid inbound credential")]
    Unauthorized,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no accounts configured")]
    NoAccountsConfigured,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ProxyError {
    fn from(rejection: JsonRejection) -> Self {
        ProxyError::InvalidRequest(rejection.body_text())
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::UpstreamUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::Internal(format!("json error: {err}"))
    }
}

/// `error.type` values a client can match on, per `spec.md` §7.
fn error_type(err: &ProxyError) -> &'static str {
    match err {
        ProxyError::Unauthorized => "authentication_error",
        ProxyError::InvalidRequest(_) => "invalid_request_error",
        ProxyError::NoAccountsConfigured => "no_accounts_configured",
        ProxyError::UpstreamUnavailable(_) => "upstream_unavailable",
        ProxyError::UpstreamRejected(_) => "upstream_rejected",
        ProxyError::Internal(_) => "internal_error",
    }
}

fn status_code(err: &ProxyError) -> StatusCode {
    match err {
        ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
        ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ProxyError::NoAccountsConfigured => StatusCode::SERVICE_UNAVAILABLE,
        ProxyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        ProxyError::UpstreamRejected(_) => StatusCode::BAD_GATEWAY,
        ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let body = ApiErrorBody {
            error: ApiErrorObject {
                message: self.to_string(),
                error_type: error_type(&self).to_string(),
                code: status.as_u16(),
            },
        };
        match status {
            s if s.is_server_error() => tracing::error!(status = %s, err = %self, "request failed"),
            _ => tracing::warn!(status = %status, err = %self, "request rejected"),
        }
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorObject {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: u16,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorObject,
}

/// OAuth/token-refresh specific failures, kept distinct from `ProxyError`
/// so the credential pool can decide per-account fate (dead vs transient)
/// before folding the outcome into a request-scoped `ProxyError`.
#[derive(Debug, ThisError)]
pub enum OauthError {
    #[error("oauth transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oauth token endpoint rejected the refresh: {0}")]
    InvalidGrant(String),

    #[error("oauth token endpoint returned a transient error: {0}")]
    ServerError(String),

    #[error("failed to parse oauth response: {0}")]
    Parse(String),

    #[error("onboarding did not complete within the poll window")]
    OnboardTimeout,

    #[error("onboarding reported no eligible tier: {0}")]
    Ineligible(String),
}

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for OauthError {
    fn is_retryable(&self) -> bool {
        match self {
            OauthError::Transport(_) => true,
            OauthError::InvalidGrant(_) => false,
            OauthError::ServerError(_) => true,
            OauthError::Parse(_) => false,
            OauthError::OnboardTimeout => false,
            OauthError::Ineligible(_) => false,
        }
    }
}
