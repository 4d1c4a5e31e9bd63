//! Persistence contract.
//!
//! The core treats accounts and policy as load/save blobs and does not
//! depend on storage technology; a database backend implements the same
//! trait as the bundled JSON file store.

mod json_file;

use async_trait::async_trait;
use gempool_types::error::PersistError;
use gempool_types::models::{Account, Policy};

pub use json_file::JsonFileStore;

/// Load/save collaborator for durable state.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Load the full account catalog. An empty catalog is not an error; an
    /// unreachable store is.
    async fn load_accounts(&self) -> Result<Vec<Account>, PersistError>;

    /// Replace the persisted catalog with the given set.
    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), PersistError>;

    /// Load the orchestration policy.
    async fn load_policy(&self) -> Result<Policy, PersistError>;

    /// Replace the persisted policy.
    async fn save_policy(&self, policy: &Policy) -> Result<(), PersistError>;
}
