//! The credential pool: an ordered set of Accounts behind one mutex,
//! round-robin leased, refreshed-before-use, and persisted atomically.
//!
//! Unlike the teacher's actor-plus-rate-limited-background-worker scheme
//! (`providers::geminicli::workers::refresher`), this pool has no
//! out-of-band refresh pipeline: refresh runs synchronously inside the
//! lease's critical section, per this surface's single-process, rare-refresh
//! workload — see the module doc on why that's acceptable here.

use super::account::Account;
use super::oauth::{ensure_companion_project, refresh_access_token};
use crate::error::ProxyError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

struct PoolState {
    accounts: Vec<Account>,
    cursor: usize,
}

/// A leased account snapshot, valid for the duration of one upstream call.
#[derive(Debug, Clone)]
pub struct Lease {
    pub index: usize,
    pub account: Account,
}

pub struct CredentialPool {
    state: Mutex<PoolState>,
    http: reqwest::Client,
}

impl CredentialPool {
    pub fn new(accounts: Vec<Account>, http: reqwest::Client) -> Self {
        Self {
            state: Mutex::new(PoolState {
                accounts,
                cursor: 0,
            }),
            http,
        }
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    /// Load one more account file and append it to the pool.
    pub async fn add(&self, path: &Path) -> Result<(), ProxyError> {
        let account = super::load_account_file(path).await?;
        let mut state = self.state.lock().await;
        state.accounts.push(account);
        Ok(())
    }

    /// Advance the cursor, refresh the chosen account if due, persist the
    /// refresh, and return a snapshot for the caller's upstream call.
    ///
    /// Refresh happens with the pool mutex held: this is the single critical
    /// section that makes invariant 7 (two concurrent leases never race two
    /// refreshes of the same account) hold without a per-account lock.
    pub async fn lease(&self) -> Result<Lease, ProxyError> {
        let mut state = self.state.lock().await;
        let n = state.accounts.len();
        if n == 0 {
            return Err(ProxyError::NoAccountsConfigured);
        }

        let start = state.cursor;
        for step in 0..n {
            let idx = (start + step) % n;
            if state.accounts[idx].dead {
                continue;
            }
            state.cursor = (idx + 1) % n;

            if state.accounts[idx].needs_refresh() {
                refresh_locked(&mut state.accounts[idx], &self.http).await;
            }

            if state.accounts[idx].dead {
                continue;
            }

            return Ok(Lease {
                index: idx,
                account: state.accounts[idx].clone(),
            });
        }

        Err(ProxyError::NoAccountsConfigured)
    }

    /// Reserved for quarantine-on-failure; the pool does not currently act
    /// on the outcome, matching the source's behaviour.
    pub async fn release(&self, _index: usize) {}

    /// Ensure the account at `index` has completed the CodeAssist handshake,
    /// returning its project id. Runs under the pool mutex so a concurrent
    /// lease of the same account can't trigger a second `onboardUser` call.
    pub async fn ensure_onboarded(&self, index: usize) -> Result<String, ProxyError> {
        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(index)
            .ok_or(ProxyError::NoAccountsConfigured)?;

        if let Some(project_id) = account.project_id() {
            return Ok(project_id.to_string());
        }

        let access_token = account.access_token().to_string();
        match ensure_companion_project(&access_token, &self.http).await {
            Ok(project_id) => {
                account.record.project_id = Some(project_id.clone());
                account.onboarded = true;
                if let Err(e) = persist(account).await {
                    warn!(account = %account.label(), error = %e, "failed to persist onboarded project id");
                }
                Ok(project_id)
            }
            Err(e) => {
                warn!(account = %account.label(), error = %e, "onboarding failed");
                Err(ProxyError::UpstreamUnavailable(e.to_string()))
            }
        }
    }
}

async fn refresh_locked(account: &mut Account, http: &reqwest::Client) {
    let result = refresh_access_token(
        &account.record.client_id,
        &account.record.client_secret,
        &account.record.token_uri,
        &account.record.refresh_token,
        http,
    )
    .await;

    match result {
        Ok(payload) => match apply_refresh_payload(account, &payload) {
            Ok(()) => {
                if let Err(e) = persist(account).await {
                    error!(account = %account.label(), error = %e, "failed to persist refreshed token");
                }
            }
            Err(e) => error!(account = %account.label(), error = %e, "malformed refresh payload"),
        },
        Err(e) if e.is_retryable() => {
            warn!(account = %account.label(), error = %e, "transient refresh failure, using last known token");
        }
        Err(e) => {
            error!(account = %account.label(), error = %e, "refresh rejected, marking account dead");
            account.dead = true;
        }
    }
}

fn apply_refresh_payload(account: &mut Account, payload: &serde_json::Value) -> Result<(), ProxyError> {
    if let Some(token) = payload.get("access_token").and_then(serde_json::Value::as_str) {
        account.record.access_token = token.to_string();
    }
    if let Some(refresh_token) = payload.get("refresh_token").and_then(serde_json::Value::as_str) {
        account.record.refresh_token = refresh_token.to_string();
    }
    if let Some(email) = payload.get("email").and_then(serde_json::Value::as_str) {
        account.record.email = Some(email.to_string());
    }
    if let Some(expires_in) = payload.get("expires_in").and_then(serde_json::Value::as_i64) {
        account.record.expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in);
    }
    Ok(())
}

async fn persist(account: &Account) -> Result<(), ProxyError> {
    let body = serde_json::to_vec_pretty(&account.record)?;
    let tmp_path = tmp_path_for(&account.source);
    fs::write(&tmp_path, &body)
        .await
        .map_err(|e| ProxyError::Internal(format!("writing {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, &account.source)
        .await
        .map_err(|e| ProxyError::Internal(format!("renaming into {}: {e}", account.source.display())))?;
    info!(account = %account.label(), "persisted refreshed credential");
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::account::AccountRecord;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    fn fresh_account() -> Account {
        let record: AccountRecord = serde_json::from_value(json!({
            "client_id": "id",
            "client_secret": "secret",
            "token": "access-token",
            "refresh_token": "refresh-token",
            "expiry": Utc::now() + ChronoDuration::hours(1),
            "project_id": "proj-1",
        }))
        .unwrap();
        Account::new(PathBuf::from("/tmp/does-not-exist.json"), record)
    }

    #[tokio::test]
    async fn lease_round_robins_across_accounts() {
        let pool = CredentialPool::new(
            vec![fresh_account(), fresh_account()],
            reqwest::Client::new(),
        );
        let first = pool.lease().await.unwrap();
        let second = pool.lease().await.unwrap();
        assert_ne!(first.index, second.index);
    }

    #[tokio::test]
    async fn lease_fails_with_no_accounts_configured_on_empty_pool() {
        let pool = CredentialPool::new(Vec::new(), reqwest::Client::new());
        let err = pool.lease().await.unwrap_err();
        assert!(matches!(err, ProxyError::NoAccountsConfigured));
    }

    #[tokio::test]
    async fn lease_skips_dead_accounts() {
        let mut dead = fresh_account();
        dead.dead = true;
        let pool = CredentialPool::new(vec![dead, fresh_account()], reqwest::Client::new());
        let lease = pool.lease().await.unwrap();
        assert_eq!(lease.index, 1);
    }

    #[tokio::test]
    async fn ensure_onboarded_returns_cached_project_id_without_network() {
        let pool = CredentialPool::new(vec![fresh_account()], reqwest::Client::new());
        let project_id = pool.ensure_onboarded(0).await.unwrap();
        assert_eq!(project_id, "proj-1");
    }
}
