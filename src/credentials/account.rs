//! One OAuth identity, persisted as a single JSON file under the accounts
//! directory. Mirrors the field set of the teacher's `GoogleCredential`
//! extended with the OAuth client id/secret and token endpoint this proxy's
//! accounts carry inline rather than from a shared application registration.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_BUFFER: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/cloud-platform".to_string(),
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
        "openid".to_string(),
    ]
}

/// On-disk shape of `accounts/*.json`, per the account file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "token")]
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One credential the pool can lease. Wraps the persisted record with
/// process-lifetime state (onboarding, dead-marking, source path) that never
/// round-trips to disk.
#[derive(Debug, Clone)]
pub struct Account {
    pub source: PathBuf,
    pub record: AccountRecord,
    pub onboarded: bool,
    pub dead: bool,
}

impl Account {
    pub fn new(source: PathBuf, record: AccountRecord) -> Self {
        let onboarded = record.project_id.is_some();
        Self {
            source,
            record,
            onboarded,
            dead: false,
        }
    }

    /// True when the token is expired or within the 60 second refresh buffer.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_BUFFER) >= self.record.expiry
    }

    pub fn access_token(&self) -> &str {
        &self.record.access_token
    }

    pub fn project_id(&self) -> Option<&str> {
        self.record.project_id.as_deref()
    }

    /// A diagnostic-friendly label that never reveals a secret.
    pub fn label(&self) -> String {
        self.record
            .email
            .clone()
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(expiry: DateTime<Utc>) -> AccountRecord {
        serde_json::from_value(json!({
            "client_id": "id",
            "client_secret": "secret",
            "token": "access",
            "refresh_token": "refresh",
            "expiry": expiry,
        }))
        .unwrap()
    }

    #[test]
    fn fills_default_scopes_and_token_uri() {
        let r = record(Utc::now() + Duration::hours(1));
        assert_eq!(r.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(r.scopes.len(), 4);
    }

    #[test]
    fn needs_refresh_within_sixty_second_buffer() {
        let account = Account::new(
            PathBuf::from("a.json"),
            record(Utc::now() + Duration::seconds(30)),
        );
        assert!(account.needs_refresh());
    }

    #[test]
    fn does_not_need_refresh_well_before_expiry() {
        let account = Account::new(
            PathBuf::from("a.json"),
            record(Utc::now() + Duration::hours(1)),
        );
        assert!(!account.needs_refresh());
    }
}
