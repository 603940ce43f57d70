//! Google OAuth endpoints and the CodeAssist onboarding handshake. Grounded
//! in the teacher's `google_oauth::endpoints`/`ops` stateless-endpoint split
//! and `providers::geminicli::workers::refresher::perform_onboarding`, but
//! with this proxy's own poll constants (120s / 2s, per this surface's
//! onboarding contract) rather than the teacher's 5-attempt/5s table.

use crate::error::OauthError;
use backon::{ExponentialBuilder, Retryable};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::basic::BasicErrorResponseType;
use oauth2::{
    AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    ErrorResponse, ExtraTokenFields, RefreshToken, RequestTokenError, StandardRevocableToken,
    StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const LOAD_CODE_ASSIST_URL: &str = "https://cloudcode-pa.googleapis.com/v1internal:loadCodeAssist";
const ONBOARD_CODE_ASSIST_URL: &str = "https://cloudcode-pa.googleapis.com/v1internal:onboardUser";

const ONBOARD_POLL_TOTAL: Duration = Duration::from_secs(120);
const ONBOARD_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Deserialize, Serialize)]
struct GoogleTokenField {
    #[serde(rename = "id_token")]
    id_token: Option<String>,
}
impl ExtraTokenFields for GoogleTokenField {}

type GoogleTokenResponse = StandardTokenResponse<GoogleTokenField, BasicTokenType>;

type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

fn build_oauth2_client(
    client_id: &str,
    client_secret: &str,
    token_uri: &str,
) -> Result<GoogleOauth2Client, OauthError> {
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
        .map_err(|e| OauthError::Parse(e.to_string()))?;
    let token_url =
        TokenUrl::new(token_uri.to_string()).map_err(|e| OauthError::Parse(e.to_string()))?;
    Ok(
        OAuth2Client::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url),
    )
}

/// Refresh an access token. Returns the raw token response as JSON so the
/// caller can fold it back into an `AccountRecord` with a tolerant merge.
pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    token_uri: &str,
    refresh_token: &str,
    http: &reqwest::Client,
) -> Result<Value, OauthError> {
    let client = build_oauth2_client(client_id, client_secret, token_uri)?;
    let token_result: GoogleTokenResponse = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(http)
        .await
        .map_err(map_refresh_error)?;
    let mut payload = serde_json::to_value(&token_result).map_err(|e| OauthError::Parse(e.to_string()))?;
    attach_email_from_id_token(&mut payload);
    Ok(payload)
}

/// Only an actual `invalid_grant` from the token endpoint means the refresh
/// token itself is dead; transport failures and other server-side errors
/// are transient and must not permanently kill the account (`pool.rs`'s
/// `refresh_locked` only does that for non-retryable errors).
fn map_refresh_error(
    err: RequestTokenError<reqwest::Error, oauth2::basic::BasicErrorResponse>,
) -> OauthError {
    match err {
        RequestTokenError::ServerResponse(resp) => {
            let description = resp.error_description().cloned().unwrap_or_default();
            if matches!(resp.error(), BasicErrorResponseType::InvalidGrant) {
                OauthError::InvalidGrant(description)
            } else {
                OauthError::ServerError(format!("{:?}: {description}", resp.error()))
            }
        }
        RequestTokenError::Request(e) => OauthError::Transport(e),
        RequestTokenError::Parse(e, _) => OauthError::Parse(e.to_string()),
        RequestTokenError::Other(msg) => OauthError::ServerError(msg),
    }
}

/// Insert an `email` claim decoded from the embedded `id_token`, when present.
fn attach_email_from_id_token(payload: &mut Value) {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let email = payload
        .get("id_token")
        .and_then(Value::as_str)
        .and_then(|token| token.split('.').nth(1))
        .and_then(|b64| URL_SAFE_NO_PAD.decode(b64).ok())
        .and_then(|decoded| serde_json::from_slice::<Value>(&decoded).ok())
        .and_then(|claims| claims.get("email").and_then(Value::as_str).map(str::to_owned));

    if let (Some(obj), Some(email)) = (payload.as_object_mut(), email) {
        obj.insert("email".to_string(), Value::String(email));
    }
}

async fn load_code_assist(access_token: &str, http: &reqwest::Client) -> Result<Value, OauthError> {
    let resp = http
        .post(LOAD_CODE_ASSIST_URL)
        .bearer_auth(access_token)
        .json(&json!({}))
        .send()
        .await
        .map_err(OauthError::Transport)?;
    if !resp.status().is_success() {
        return Err(OauthError::InvalidGrant(format!(
            "loadCodeAssist returned {}",
            resp.status()
        )));
    }
    resp.json().await.map_err(OauthError::Transport)
}

async fn onboard_user(
    access_token: &str,
    tier_id: &str,
    cloudaicompanion_project: Option<&str>,
    http: &reqwest::Client,
) -> Result<Value, OauthError> {
    let body = json!({
        "tierId": tier_id,
        "cloudaicompanionProject": cloudaicompanion_project,
        "metadata": {
            "ideType": "IDE_UNSPECIFIED",
            "platform": "PLATFORM_UNSPECIFIED",
            "pluginType": "GEMINI",
        },
    });
    let resp = http
        .post(ONBOARD_CODE_ASSIST_URL)
        .bearer_auth(access_token)
        .json(&body)
        .send()
        .await
        .map_err(OauthError::Transport)?;
    if !resp.status().is_success() {
        return Err(OauthError::InvalidGrant(format!(
            "onboardUser returned {}",
            resp.status()
        )));
    }
    resp.json().await.map_err(OauthError::Transport)
}

/// Discover (or provision) the companion project id for an account, per
/// `loadCodeAssist` + optional `onboardUser` polling.
pub async fn ensure_companion_project(
    access_token: &str,
    http: &reqwest::Client,
) -> Result<String, OauthError> {
    let load_json = (|| async { load_code_assist(access_token, http).await })
        .retry(retry_policy())
        .when(|e: &OauthError| e.is_retryable())
        .notify(|err, dur: Duration| warn!("loadCodeAssist retrying after {err}, sleeping {dur:?}"))
        .await?;
    debug!(body = %load_json, "loadCodeAssist response");

    if let Some(project_id) = load_json.get("cloudaicompanionProject").and_then(Value::as_str) {
        return Ok(project_id.to_string());
    }

    let tier_id = load_json
        .get("allowedTiers")
        .and_then(Value::as_array)
        .and_then(|tiers| tiers.first())
        .and_then(|tier| tier.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("free-tier")
        .to_string();

    info!(tier = %tier_id, "no companion project on file; starting onboarding");
    poll_onboarding(access_token, &tier_id, http).await
}

async fn poll_onboarding(
    access_token: &str,
    tier_id: &str,
    http: &reqwest::Client,
) -> Result<String, OauthError> {
    let deadline = tokio::time::Instant::now() + ONBOARD_POLL_TOTAL;
    loop {
        let resp_json = (|| async { onboard_user(access_token, tier_id, None, http).await })
            .retry(retry_policy())
            .when(|e: &OauthError| e.is_retryable())
            .notify(|err, dur: Duration| warn!("onboardUser retrying after {err}, sleeping {dur:?}"))
            .await?;
        debug!(body = %resp_json, "onboardUser response");

        if resp_json.get("done").and_then(Value::as_bool) == Some(true) {
            return resp_json
                .get("response")
                .and_then(|r| r.get("cloudaicompanionProject"))
                .and_then(|p| p.get("id"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    OauthError::Ineligible(
                        "onboarding completed but returned no project id".to_string(),
                    )
                });
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(OauthError::OnboardTimeout);
        }
        sleep(ONBOARD_POLL_INTERVAL).await;
    }
}
