//! JSON-file persistence backend.
//!
//! One directory, two documents: `accounts.json` and `policy.json`. Writes
//! go through a temp file plus rename so a crash mid-write never leaves a
//! torn document behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gempool_types::error::PersistError;
use gempool_types::models::{Account, Policy};
use serde::Serialize;

use super::Persistence;

const ACCOUNTS_FILE: &str = "accounts.json";
const POLICY_FILE: &str = "policy.json";

/// File-backed persistence rooted at a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| PersistError::from_io_error(&e))?;
        Ok(Self { dir })
    }

    fn accounts_path(&self) -> PathBuf {
        self.dir.join(ACCOUNTS_FILE)
    }

    fn policy_path(&self) -> PathBuf {
        self.dir.join(POLICY_FILE)
    }
}

async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let temp_path = path.with_extension("json.tmp");
    let json_str =
        serde_json::to_string_pretty(value).map_err(|e| PersistError::from_json_error(&e))?;

    tokio::fs::write(&temp_path, &json_str)
        .await
        .map_err(|e| PersistError::from_io_error(&e))?;

    tokio::fs::rename(&temp_path, path).await.map_err(|e| PersistError::from_io_error(&e))?;

    Ok(())
}

#[async_trait]
impl Persistence for JsonFileStore {
    async fn load_accounts(&self) -> Result<Vec<Account>, PersistError> {
        let path = self.accounts_path();
        if !path.exists() {
            // First run: nothing persisted yet.
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PersistError::ReadError { message: e.to_string() })?;
        serde_json::from_str(&content).map_err(|e| PersistError::from_json_error(&e))
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), PersistError> {
        atomic_write_json(&self.accounts_path(), &accounts).await?;
        tracing::debug!("persisted {} account(s)", accounts.len());
        Ok(())
    }

    async fn load_policy(&self) -> Result<Policy, PersistError> {
        let path = self.policy_path();
        if !path.exists() {
            return Err(PersistError::NotFound { path: path.display().to_string() });
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PersistError::ReadError { message: e.to_string() })?;
        serde_json::from_str(&content).map_err(|e| PersistError::from_json_error(&e))
    }

    async fn save_policy(&self, policy: &Policy) -> Result<(), PersistError> {
        atomic_write_json(&self.policy_path(), policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gempool_types::models::Credential;

    fn make_account(id: &str) -> Account {
        Account::new(id.to_string(), Credential::new(format!("cred-{id}")))
    }

    #[tokio::test]
    async fn test_accounts_round_trip_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");

        let accounts = vec![make_account("a"), make_account("b")];
        store.save_accounts(&accounts).await.expect("save");

        let loaded = store.load_accounts().await.expect("load");
        store.save_accounts(&loaded).await.expect("save again");
        let reloaded = store.load_accounts().await.expect("reload");

        // Same set, order-irrelevant.
        let ids = |v: &[Account]| {
            let mut ids: Vec<String> = v.iter().map(|a| a.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&loaded), ids(&accounts));
        assert_eq!(loaded.len(), reloaded.len());
        for account in &loaded {
            assert!(reloaded.contains(account));
        }
    }

    #[tokio::test]
    async fn test_missing_accounts_file_is_empty_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");
        assert!(store.load_accounts().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn test_missing_policy_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");
        assert!(matches!(store.load_policy().await, Err(PersistError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_policy_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");

        let policy = Policy { cooldown_seconds: 42, ..Policy::default() };
        store.save_policy(&policy).await.expect("save");
        assert_eq!(store.load_policy().await.expect("load"), policy);
    }
}
