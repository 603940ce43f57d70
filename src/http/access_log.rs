//! Outer access-log middleware wrapping every route, mirroring the
//! teacher's `server::router::access_log`: method, path, status, latency,
//! and a per-HTTP-request id distinct from the 8-hex pipeline request id
//! (that one is assigned deeper in the stack, once a model has resolved).

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use rand::RngCore;
use std::time::Instant;
use tracing::{error, info, warn};

fn generate_access_id() -> String {
    let mut bytes = [0u8; 6];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let access_id = generate_access_id();

    let start = Instant::now();
    let resp = next.run(req).await;
    let latency_ms = start.elapsed().as_millis();
    let status = resp.status();

    if status.is_server_error() {
        error!(access_id = %access_id, %method, %path, %status, %latency_ms, "request failed");
    } else if status.is_client_error() {
        warn!(access_id = %access_id, %method, %path, %status, %latency_ms, "request rejected");
    } else {
        info!(access_id = %access_id, %method, %path, %status, %latency_ms, "request completed");
    }

    resp
}
