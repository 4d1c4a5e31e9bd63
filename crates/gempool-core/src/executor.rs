//! Upstream capability contract.
//!
//! The Executor performs the actual upstream interaction given an account
//! session and an egress; it is opaque to the orchestrator beyond this
//! contract. Implementations live with the request-serving layer (browser or
//! HTTP mechanics, protocol mapping).

use std::time::Duration;

use async_trait::async_trait;
use gempool_types::error::AccountError;
use gempool_types::models::{Credential, ExecutionOutcome, Task};

/// A freshly provisioned upstream account, as returned by auto-registration.
#[derive(Debug, Clone)]
pub struct RegisteredAccount {
    /// Session credential for the new identity
    pub credential: Credential,
    /// Optional display label (e.g. the mailbox used during signup)
    pub label: Option<String>,
}

/// Capability consumed by the Dispatcher and HealthMonitor.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform one upstream interaction.
    ///
    /// `proxy_url` is the egress to route through (None = direct).
    /// `deadline` is advisory; the dispatcher additionally enforces it and
    /// classifies an overrun as [`ExecutionOutcome::Timeout`]. The returned
    /// outcome is the Executor's own classification of the interaction.
    async fn run(
        &self,
        credential: &Credential,
        proxy_url: Option<&str>,
        task: &Task,
        deadline: Duration,
    ) -> ExecutionOutcome;

    /// Re-establish an expired session, returning the new credential.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AccountError>;

    /// Provision a brand-new upstream account (auto-registration).
    async fn register(&self) -> Result<RegisteredAccount, AccountError>;
}
