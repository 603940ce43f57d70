//! Exercises the upstream pipeline's fail-over contract (`spec.md` §4.4)
//! against a mock CodeAssist server, the way the teacher's
//! `antigravity_refresher_tests.rs` drives a mock OAuth/API server through
//! an ephemeral `TcpListener`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use codeassist_proxy::credentials::{Account, AccountRecord, CredentialPool};
use codeassist_proxy::envelope::RequestEnvelope;
use codeassist_proxy::error::ProxyError;
use codeassist_proxy::pipeline::Pipeline;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

fn account_with_token(token: &str) -> Account {
    let record: AccountRecord = serde_json::from_value(json!({
        "client_id": "id",
        "client_secret": "secret",
        "token": token,
        "refresh_token": "refresh",
        "expiry": Utc::now() + ChronoDuration::hours(1),
        "project_id": "proj-1",
    }))
    .unwrap();
    Account::new(PathBuf::from(format!("/tmp/{token}.json")), record)
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[tokio::test]
async fn rotates_to_next_account_on_401() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_handler = calls.clone();

    let app = Router::new().route(
        "/v1internal:generateContent",
        post(move |headers: HeaderMap, Json(_body): Json<Value>| {
            let calls = calls_for_handler.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if bearer_token(&headers).as_deref() == Some("bad-token") {
                    return (axum::http::StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid"})));
                }
                (
                    axum::http::StatusCode::OK,
                    Json(json!({
                        "response": {
                            "candidates": [{
                                "content": {"role": "model", "parts": [{"text": "hi"}]},
                                "finishReason": "STOP",
                            }],
                        },
                    })),
                )
            }
        }),
    );

    let base = spawn(app).await;
    let pool = Arc::new(CredentialPool::new(
        vec![account_with_token("bad-token"), account_with_token("good-token")],
        reqwest::Client::new(),
    ));
    let pipeline = Pipeline::with_base_url(pool, reqwest::Client::new(), &base);

    let envelope = RequestEnvelope::new("gemini-2.5-flash", false);
    let resp = pipeline
        .execute(&envelope, "gemini-2.5-flash", &json!({"contents": []}))
        .await
        .expect("should succeed after rotating off the rejected account");

    assert!(resp.status().is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2, "expected one rejected call, one accepted call");
}

#[tokio::test]
async fn does_not_rotate_on_429() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_handler = calls.clone();

    let app = Router::new().route(
        "/v1internal:generateContent",
        post(move |Json(_body): Json<Value>| {
            let calls = calls_for_handler.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                (axum::http::StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "rate limited"})))
            }
        }),
    );

    let base = spawn(app).await;
    let pool = Arc::new(CredentialPool::new(
        vec![account_with_token("a"), account_with_token("b")],
        reqwest::Client::new(),
    ));
    let pipeline = Pipeline::with_base_url(pool, reqwest::Client::new(), &base);

    let envelope = RequestEnvelope::new("gemini-2.5-flash", false);
    let err = pipeline
        .execute(&envelope, "gemini-2.5-flash", &json!({"contents": []}))
        .await
        .expect_err("429 must surface immediately without rotation");

    assert!(matches!(err, ProxyError::UpstreamRejected(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "429 must not trigger a retry on another account");
}

#[tokio::test]
async fn exhausting_all_accounts_surfaces_the_last_rejection() {
    let app = Router::new().route(
        "/v1internal:generateContent",
        post(|Json(_body): Json<Value>| async move {
            (axum::http::StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"})))
        }),
    );

    let base = spawn(app).await;
    let pool = Arc::new(CredentialPool::new(
        vec![account_with_token("a"), account_with_token("b")],
        reqwest::Client::new(),
    ));
    let pipeline = Pipeline::with_base_url(pool, reqwest::Client::new(), &base);

    let envelope = RequestEnvelope::new("gemini-2.5-flash", false);
    let err = pipeline
        .execute(&envelope, "gemini-2.5-flash", &json!({"contents": []}))
        .await
        .expect_err("all accounts rejected");

    assert!(matches!(err, ProxyError::UpstreamRejected(_)));
    assert!(
        err.to_string().contains("all configured accounts rejected this request"),
        "exhaustion error should mention account exhaustion, got: {err}"
    );
}

#[tokio::test]
async fn empty_pool_fails_immediately_with_no_accounts_configured() {
    let pool = Arc::new(CredentialPool::new(Vec::new(), reqwest::Client::new()));
    let pipeline = Pipeline::with_base_url(pool, reqwest::Client::new(), "http://127.0.0.1:1");

    let envelope = RequestEnvelope::new("gemini-2.5-flash", false);
    let err = pipeline
        .execute(&envelope, "gemini-2.5-flash", &json!({"contents": []}))
        .await
        .expect_err("no accounts configured");

    assert!(matches!(err, ProxyError::NoAccountsConfigured));
}
