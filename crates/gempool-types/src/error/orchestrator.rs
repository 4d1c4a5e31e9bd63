//! Errors that cross the `execute` boundary and the admin surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AccountStatus, OutcomeKind};

/// Errors surfaced by the orchestrator to its callers.
///
/// The dispatch path only ever returns `PoolExhausted`, `UpstreamRejected`,
/// `Timeout`, or `Retryable`; everything account- or proxy-health-related is
/// absorbed into state transitions before reaching the caller. The remaining
/// variants belong to the admin surface.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum OrchestratorError {
    /// No eligible (account, proxy) pair at call time. Caller may retry later.
    #[error("Pool exhausted: {reason}")]
    PoolExhausted {
        /// Explanation of why no candidate was available
        reason: String,
    },

    /// Upstream rejected the request permanently; retrying won't help.
    #[error("Upstream rejected request: {message}")]
    UpstreamRejected {
        /// Upstream-provided rejection detail
        message: String,
    },

    /// Executor exceeded its deadline.
    #[error("Request timeout after {duration_secs}s")]
    Timeout {
        /// Deadline that was exceeded, in seconds
        duration_secs: u64,
    },

    /// Transient failure (session, rate, or network level). The caller may
    /// invoke `execute` again; a different account/proxy will be selected.
    #[error("Retryable failure: {kind}")]
    Retryable {
        /// Which class of transient failure occurred
        kind: OutcomeKind,
    },

    /// Admin surface: account with given ID not found.
    #[error("Account not found: {id}")]
    AccountNotFound {
        /// Unique identifier of the missing account
        id: String,
    },

    /// Admin surface: requested status change is not a legal transition.
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Current account status
        from: AccountStatus,
        /// Requested account status
        to: AccountStatus,
    },
}

impl OrchestratorError {
    /// Check if the caller may reasonably retry this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::Retryable { .. } | Self::Timeout { .. })
    }
}
