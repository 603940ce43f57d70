//! `POST /v1beta/models/{model}:generateContent` and
//! `POST /v1beta/models/{model}:streamGenerateContent`, per `spec.md` §4.2.
//! `matchit` (axum's router) captures a whole path segment, so both verbs
//! share one route on `{model_action}` and this handler splits the
//! `:generateContent`/`:streamGenerateContent` suffix back off.

use crate::envelope::RequestEnvelope;
use crate::error::ProxyError;
use crate::http::auth::RequireAuth;
use crate::http::sse::{bridge, sse_response};
use crate::http::state::AppState;
use crate::model_catalog::resolve;
use crate::schema::gemini::CodeAssistResponseEnvelope;
use crate::translate::unwrap_response;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::Instrument;

pub async fn generate_content(
    State(state): State<AppState>,
    _auth: RequireAuth,
    Path(model_action): Path<String>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let (model_name, stream) = if let Some(base) = model_action.strip_suffix(":streamGenerateContent") {
        (base, true)
    } else if let Some(base) = model_action.strip_suffix(":generateContent") {
        (base, false)
    } else {
        return Err(ProxyError::InvalidRequest(format!(
            "unsupported native method on {model_action}"
        )));
    };

    let resolved = resolve(model_name)
        .ok_or_else(|| ProxyError::InvalidRequest(format!("unknown model: {model_name}")))?;
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRequest(format!("malformed request body: {e}")))?;

    let envelope = RequestEnvelope::new(model_name.to_string(), stream);
    let span = envelope.span();
    let upstream = state
        .pipeline
        .execute(&envelope, resolved.base_name, &payload)
        .instrument(span)
        .await?;

    if !stream {
        let wrapped: CodeAssistResponseEnvelope = upstream.json().await?;
        let response = unwrap_response(wrapped);
        return Ok(Json(response).into_response());
    }

    let events = bridge(
        upstream,
        |response| Event::default().json_data(&response).ok().into_iter().collect(),
        || vec![Event::default().data("[DONE]")],
    );
    Ok(sse_response(events))
}
