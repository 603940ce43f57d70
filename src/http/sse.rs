//! Upstream-to-client SSE bridging shared by the OpenAI and native streaming
//! routes, per `spec.md` §4.4. Grounded in the teacher's
//! `server::routes::geminicli::respond::{transform_stream, build_stream_response}`
//! combinator style (`eventsource_stream::Eventsource` + `tokio_stream`'s
//! idle `.timeout()`), extended with the trailing finish/`[DONE]` framing
//! and the error-frame-then-terminate behaviour `spec.md` §4.4/§7 call for.

use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::http::HeaderValue;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::StreamExt as TokioStreamExt;

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

fn error_event(message: &str) -> Event {
    let body = json!({"error": {"message": message}});
    match Event::default().json_data(body) {
        Ok(ev) => ev,
        Err(_) => Event::default().data(r#"{"error":{"message":"stream error"}}"#),
    }
}

/// Decode the upstream CodeAssist SSE sequence and bridge it into a
/// client-facing event stream. `on_chunk` translates one decoded upstream
/// response into zero or more outbound events; `on_finish` supplies the
/// trailing event(s) once upstream closes cleanly (a protocol-specific
/// closing chunk, a literal `[DONE]`, or both). An upstream parse error, a
/// transport error, or 60s of silence instead emits a single SSE error frame
/// and ends the stream without calling `on_finish`, per `spec.md` §7 ("does
/// not attempt mid-stream rotation").
pub fn bridge<F, G>(
    resp: reqwest::Response,
    mut on_chunk: F,
    on_finish: G,
) -> impl Stream<Item = Event> + Send + 'static
where
    F: FnMut(crate::schema::gemini::GenerateContentResponse) -> Vec<Event> + Send + 'static,
    G: FnOnce() -> Vec<Event> + Send + 'static,
{
    let terminated = Arc::new(Mutex::new(false));
    let terminated_items = terminated.clone();

    let raw = resp.bytes_stream().eventsource().timeout(IDLE_TIMEOUT);

    let items = raw.flat_map(move |item| {
        let mut done = terminated_items.lock().expect("sse termination flag poisoned");
        if *done {
            return stream::iter(Vec::new());
        }

        let mut out = Vec::new();
        match item {
            Ok(Ok(ev)) if ev.data.is_empty() => {}
            Ok(Ok(ev)) => match serde_json::from_str::<crate::schema::gemini::CodeAssistResponseEnvelope>(&ev.data) {
                Ok(envelope) => out.extend(on_chunk(crate::translate::unwrap_response(envelope))),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed upstream SSE chunk");
                    out.push(error_event(&format!("malformed upstream chunk: {e}")));
                    out.push(Event::default().data("[DONE]"));
                    *done = true;
                }
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "upstream SSE stream error");
                out.push(error_event(&e.to_string()));
                out.push(Event::default().data("[DONE]"));
                *done = true;
            }
            Err(_) => {
                tracing::warn!("upstream SSE stream idle timeout");
                out.push(error_event("stream idle timeout"));
                out.push(Event::default().data("[DONE]"));
                *done = true;
            }
        }
        stream::iter(out)
    });

    let mut on_finish = Some(on_finish);
    let tail = stream::once(async move {
        let done = *terminated.lock().expect("sse termination flag poisoned");
        if done {
            Vec::new()
        } else {
            on_finish.take().map_or_else(Vec::new, |f| f())
        }
    })
    .flat_map(|out| stream::iter(out));

    items.chain(tail)
}

/// Frame a bridged event stream as the `text/event-stream` response
/// `spec.md` §4.5 specifies: `Cache-Control: no-cache`, `Connection:
/// keep-alive`, and periodic keep-alive comments while idle.
pub fn sse_response(events: impl Stream<Item = Event> + Send + 'static) -> Response {
    let sse = Sse::new(events.map(Ok::<_, Infallible>)).keep_alive(KeepAlive::default());
    let mut response = sse.into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
