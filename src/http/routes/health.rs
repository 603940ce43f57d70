//! Unauthenticated liveness/descriptor routes, per `spec.md` §4.5.

use crate::http::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let accounts = state.pool.count().await;
    Json(json!({
        "status": "ok",
        "service": "codeassist-proxy",
        "accounts": accounts,
    }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "codeassist-proxy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
