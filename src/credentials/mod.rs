//! Credential pool: account loading (directory scan + legacy single-file
//! fallback), round-robin leasing with refresh-before-use, and one-time
//! CodeAssist onboarding. See `pool.rs` for the leasing contract.

mod account;
mod oauth;
mod pool;

pub use account::{Account, AccountRecord};
pub use pool::{CredentialPool, Lease};

use crate::config::Config;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// Load every account under `cfg.accounts_dir`, falling back to the legacy
/// single-file env vars only when the directory yields nothing, per
/// `SPEC_FULL.md` §4.2.
pub async fn load_pool(cfg: &Config, http: reqwest::Client) -> CredentialPool {
    let mut accounts = load_from_dir(&cfg.accounts_dir).await;

    if accounts.is_empty() {
        if let Some(account) = load_legacy_fallback(cfg).await {
            accounts.push(account);
        }
    }

    info!(count = accounts.len(), "credential pool initialized");
    CredentialPool::new(accounts, http)
}

async fn load_from_dir(dir: &str) -> Vec<Account> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir, error = %e, "accounts directory unreadable, starting with zero accounts");
            return Vec::new();
        }
    };

    let mut accounts = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir, error = %e, "error walking accounts directory");
                break;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_account_file(&path).await {
            Ok(account) => accounts.push(account),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unparseable account file"),
        }
    }
    accounts
}

pub(crate) async fn load_account_file(path: &Path) -> Result<Account, crate::error::ProxyError> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| crate::error::ProxyError::Internal(e.to_string()))?;
    let record: AccountRecord = serde_json::from_str(&contents)?;
    Ok(Account::new(path.to_path_buf(), record))
}

/// `GOOGLE_APPLICATION_CREDENTIALS` (file) or `GEMINI_CREDENTIALS` (inline
/// JSON) fallback, engaged only when the account directory is empty.
async fn load_legacy_fallback(cfg: &Config) -> Option<Account> {
    if let Some(inline) = &cfg.gemini_credentials {
        return match serde_json::from_str::<AccountRecord>(inline) {
            Ok(record) => {
                info!("loaded single account from GEMINI_CREDENTIALS");
                Some(Account::new(
                    Path::new("GEMINI_CREDENTIALS").to_path_buf(),
                    record,
                ))
            }
            Err(e) => {
                warn!(error = %e, "GEMINI_CREDENTIALS did not parse as an account record");
                None
            }
        };
    }

    let path = Path::new(&cfg.google_application_credentials);
    match load_account_file(path).await {
        Ok(account) => {
            info!(file = %path.display(), "loaded single account from GOOGLE_APPLICATION_CREDENTIALS fallback");
            Some(account)
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "no legacy credential file found either; pool starts empty");
            None
        }
    }
}
