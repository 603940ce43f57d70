//! The upstream request pipeline: authenticated delivery to the CodeAssist
//! backend, per-account fail-over, and the outer shape the streaming bridge
//! builds on. See `spec.md` §4.4 and §5 for the fail-over/timeout contract
//! this mirrors exactly, grounded in the teacher's
//! `providers::geminicli::client::{api,client}` retry/dispatch split.

use crate::credentials::CredentialPool;
use crate::envelope::RequestEnvelope;
use crate::error::ProxyError;
use crate::schema::gemini::CodeAssistEnvelope;
use crate::translate::wrap_request;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_UPSTREAM_BASE: &str = "https://cloudcode-pa.googleapis.com";

pub const PROXY_USER_AGENT: &str = "codeassist-proxy/0.1 (+gemini-oauth-proxy)";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const UNARY_READ_TIMEOUT: Duration = Duration::from_secs(300);
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_ATTEMPTS: usize = 3;

/// Build the shared `reqwest::Client` the pipeline issues every upstream
/// call through. A single client is reused across leases so connection
/// pooling works the way `spec.md` §5 expects ("HTTPS calls do not
/// serialise").
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(PROXY_USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .expect("failed to build reqwest client for upstream calls")
}

pub struct Pipeline {
    pool: std::sync::Arc<CredentialPool>,
    http: reqwest::Client,
    generate_url: String,
    stream_url: String,
}

impl Pipeline {
    pub fn new(pool: std::sync::Arc<CredentialPool>, http: reqwest::Client) -> Self {
        Self::with_base_url(pool, http, DEFAULT_UPSTREAM_BASE)
    }

    /// Same as `new`, but pointed at an arbitrary upstream base — the mock
    /// server tests exercise the fail-over/timeout contract against stand in
    /// for `https://cloudcode-pa.googleapis.com`.
    pub fn with_base_url(pool: std::sync::Arc<CredentialPool>, http: reqwest::Client, base: &str) -> Self {
        Self {
            pool,
            http,
            generate_url: format!("{base}/v1internal:generateContent"),
            stream_url: format!("{base}/v1internal:streamGenerateContent?alt=sse"),
        }
    }

    /// Issue one logical call, retrying across accounts per `spec.md` §4.4
    /// step 2. `base_model` is the resolved base name sent upstream;
    /// `request_body` is already translated (OpenAI path) or the raw
    /// passthrough body (native path) — either way it's `Serialize`.
    pub async fn execute<T: Serialize>(
        &self,
        envelope: &RequestEnvelope,
        base_model: &str,
        request_body: &T,
    ) -> Result<reqwest::Response, ProxyError> {
        let pool_size = self.pool.count().await;
        info!(
            model = %envelope.model,
            stream = envelope.stream,
            pool_size,
            "new request"
        );
        if pool_size == 0 {
            return Err(ProxyError::NoAccountsConfigured);
        }

        let attempts = pool_size.min(MAX_ATTEMPTS);
        let mut last_err: Option<ProxyError> = None;

        for attempt in 1..=attempts {
            let lease = match self.pool.lease().await {
                Ok(lease) => lease,
                Err(e) => return Err(e),
            };

            let project_id = match self.pool.ensure_onboarded(lease.index).await {
                Ok(project_id) => project_id,
                Err(e) => {
                    warn!(attempt, account_index = lease.index, error = %e, phase = "onboarding", "account onboarding failed, trying next account");
                    last_err = Some(e);
                    continue;
                }
            };

            let envelope_body = wrap_request(base_model, &project_id, request_body);
            match self
                .post(envelope, &lease.account, &envelope_body, attempt, lease.index)
                .await
            {
                Ok(resp) => return Ok(resp),
                Err(Outcome::AccountScoped(err)) => {
                    last_err = Some(err);
                    continue;
                }
                Err(Outcome::Fatal(err)) => return Err(err),
            }
        }

        Err(match last_err {
            Some(err) => ProxyError::UpstreamRejected(format!(
                "all configured accounts rejected this request: {err}"
            )),
            None => ProxyError::UpstreamRejected(
                "all configured accounts rejected this request".to_string(),
            ),
        })
    }

    async fn post<T: Serialize>(
        &self,
        envelope: &RequestEnvelope,
        account: &crate::credentials::Account,
        body: &CodeAssistEnvelope<&T>,
        attempt: usize,
        account_index: usize,
    ) -> Result<reqwest::Response, Outcome> {
        let url = if envelope.stream { &self.stream_url } else { &self.generate_url };
        let read_timeout = if envelope.stream {
            STREAM_READ_TIMEOUT
        } else {
            UNARY_READ_TIMEOUT
        };

        let start = std::time::Instant::now();
        let result = self
            .http
            .post(url)
            .bearer_auth(account.access_token())
            .timeout(read_timeout)
            .json(body)
            .send()
            .await;

        let latency_ms = start.elapsed().as_millis();

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(attempt, account_index, phase = "upstream_call", %latency_ms, "upstream call succeeded");
                Ok(resp)
            }
            Ok(resp) if matches!(resp.status().as_u16(), 401 | 403) => {
                let status = resp.status();
                let body_text = resp.text().await.unwrap_or_default();
                warn!(attempt, account_index, phase = "upstream_call", %status, "account rejected, rotating");
                Err(Outcome::AccountScoped(ProxyError::UpstreamRejected(format!(
                    "{status}: {body_text}"
                ))))
            }
            Ok(resp) if resp.status().as_u16() == 429 || resp.status().is_server_error() => {
                let status = resp.status();
                let body_text = resp.text().await.unwrap_or_default();
                warn!(attempt, account_index, phase = "upstream_call", %status, "upstream rejected without rotation");
                Err(Outcome::Fatal(ProxyError::UpstreamRejected(format!(
                    "{status}: {body_text}"
                ))))
            }
            Ok(resp) => {
                let status = resp.status();
                let body_text = resp.text().await.unwrap_or_default();
                Err(Outcome::Fatal(ProxyError::UpstreamRejected(format!(
                    "{status}: {body_text}"
                ))))
            }
            Err(e) if e.is_timeout() => {
                warn!(attempt, account_index, phase = "upstream_call", "upstream call timed out");
                Err(Outcome::Fatal(ProxyError::UpstreamUnavailable(e.to_string())))
            }
            Err(e) => {
                warn!(attempt, account_index, phase = "upstream_call", error = %e, "transport error");
                Err(Outcome::Fatal(ProxyError::UpstreamUnavailable(e.to_string())))
            }
        }
    }
}

enum Outcome {
    AccountScoped(ProxyError),
    Fatal(ProxyError),
}
