//! `POST /v1/chat/completions`, per `spec.md` §4.1/§4.5. Grounded in the
//! teacher's `server::routes::codex::respond`/`geminicli::respond` pair:
//! one handler branches on `stream`, unary responses are built directly,
//! streaming responses hand off to the shared SSE bridge.

use crate::envelope::RequestEnvelope;
use crate::error::ProxyError;
use crate::http::auth::RequireAuth;
use crate::http::sse::{bridge, sse_response};
use crate::http::state::AppState;
use crate::model_catalog::resolve;
use crate::schema::gemini::CodeAssistResponseEnvelope;
use crate::schema::openai::ChatCompletionRequest;
use crate::translate::{openai_to_gemini, unary_to_openai, unwrap_response, StreamState};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::{Arc, Mutex};
use tracing::Instrument;

pub async fn chat_completions(
    State(state): State<AppState>,
    _auth: RequireAuth,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let req: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::InvalidRequest(format!("malformed request body: {e}")))?;

    let resolved = resolve(&req.model)
        .ok_or_else(|| ProxyError::InvalidRequest(format!("unknown model: {}", req.model)))?;
    let gemini_request = openai_to_gemini(&req, &resolved).map_err(ProxyError::InvalidRequest)?;

    let envelope = RequestEnvelope::new(req.model.clone(), req.stream);
    let created = chrono::Utc::now().timestamp();
    let span = envelope.span();

    let upstream = state
        .pipeline
        .execute(&envelope, resolved.base_name, &gemini_request)
        .instrument(span)
        .await?;

    if !req.stream {
        let envelope: CodeAssistResponseEnvelope = upstream.json().await?;
        let response = unwrap_response(envelope);
        let out = unary_to_openai(&response, &req.model, created);
        return Ok(Json(out).into_response());
    }

    let stream_state = Arc::new(Mutex::new(StreamState::new(&req.model, created)));
    let for_chunks = stream_state.clone();
    let for_finish = stream_state.clone();

    let events = bridge(
        upstream,
        move |response| {
            let mut s = for_chunks.lock().expect("stream state mutex poisoned");
            s.next_chunk(&response)
                .and_then(|chunk| Event::default().json_data(&chunk).ok())
                .into_iter()
                .collect()
        },
        move || {
            let s = for_finish.lock().expect("stream state mutex poisoned");
            let reason = s.finish_reason().unwrap_or("stop");
            let mut out = Vec::new();
            if let Ok(ev) = Event::default().json_data(&s.final_chunk(reason)) {
                out.push(ev);
            }
            out.push(Event::default().data("[DONE]"));
            out
        },
    );

    Ok(sse_response(events))
}
