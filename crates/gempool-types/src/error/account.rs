//! Account-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during account operations.
///
/// These never cross the `execute` boundary; they drive state transitions
/// inside the orchestrator and show up on the admin surface and in logs.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum AccountError {
    /// Account with given ID not found
    #[error("Account not found: {id}")]
    NotFound {
        /// Unique identifier of the missing account
        id: String,
    },

    /// Account is disabled (manually or by the failure threshold)
    #[error("Account {id} is disabled: {}", reason.as_deref().unwrap_or("no reason provided"))]
    Disabled {
        /// Unique identifier of the disabled account
        id: String,
        /// Optional explanation for why the account was disabled
        reason: Option<String>,
    },

    /// Session credential has expired and needs refresh
    #[error("Credential expired for account: {id}")]
    CredentialExpired {
        /// Unique identifier of the account with expired credential
        id: String,
    },

    /// Credential refresh failed
    #[error("Failed to refresh credential for {id}: {message}")]
    RefreshFailed {
        /// Unique identifier of the account
        id: String,
        /// Details about the refresh failure
        message: String,
    },

    /// Account registration (auto-provisioning) failed
    #[error("Account registration failed: {message}")]
    RegistrationFailed {
        /// Details about the registration failure
        message: String,
    },
}

impl AccountError {
    /// Check if this is a temporary error that may resolve on retry.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CredentialExpired { .. }
                | Self::RefreshFailed { .. }
                | Self::RegistrationFailed { .. }
        )
    }
}
