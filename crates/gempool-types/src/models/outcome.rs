//! Execution outcome and dispatch-path payload types.

use serde::{Deserialize, Serialize};

/// Opaque unit of work handed to the Executor.
///
/// The orchestrator never inspects the body; the request-serving layer owns
/// its shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task(pub serde_json::Value);

/// Opaque successful response from the upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payload(pub serde_json::Value);

/// Classified result of one Executor invocation.
///
/// Produced per call by the Executor (or by the dispatcher's deadline),
/// consumed immediately by the outcome policy. Exhaustively matched at every
/// transition site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "details")]
pub enum ExecutionOutcome {
    /// Upstream interaction succeeded
    Success(Payload),
    /// Session credential was rejected; account needs re-authentication
    AuthExpired,
    /// Upstream throttled the account
    RateLimited {
        /// Upstream-suggested wait before retry, if provided
        retry_after_ms: Option<u64>,
    },
    /// Upstream returned an error
    UpstreamError {
        /// Permanent errors move the account toward Disabled faster
        permanent: bool,
        /// Upstream-provided detail
        message: String,
    },
    /// The egress path failed; implicates the proxy, not the upstream
    NetworkError {
        /// Transport-level detail
        message: String,
    },
    /// The Executor exceeded its deadline
    Timeout,
}

impl ExecutionOutcome {
    /// Collapse to the payload-free kind used in counters and events.
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            ExecutionOutcome::Success(_) => OutcomeKind::Success,
            ExecutionOutcome::AuthExpired => OutcomeKind::AuthExpired,
            ExecutionOutcome::RateLimited { .. } => OutcomeKind::RateLimited,
            ExecutionOutcome::UpstreamError { .. } => OutcomeKind::UpstreamError,
            ExecutionOutcome::NetworkError { .. } => OutcomeKind::NetworkError,
            ExecutionOutcome::Timeout => OutcomeKind::Timeout,
        }
    }
}

/// Payload-free outcome classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Upstream interaction succeeded
    Success,
    /// Session credential rejected
    AuthExpired,
    /// Upstream throttled the account
    RateLimited,
    /// Upstream returned an error
    UpstreamError,
    /// Egress path failed
    NetworkError,
    /// Deadline exceeded
    Timeout,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::AuthExpired => write!(f, "auth_expired"),
            OutcomeKind::RateLimited => write!(f, "rate_limited"),
            OutcomeKind::UpstreamError => write!(f, "upstream_error"),
            OutcomeKind::NetworkError => write!(f, "network_error"),
            OutcomeKind::Timeout => write!(f, "timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_kind_collapse() {
        let outcome = ExecutionOutcome::RateLimited { retry_after_ms: Some(5000) };
        assert_eq!(outcome.kind(), OutcomeKind::RateLimited);

        let outcome = ExecutionOutcome::Success(Payload(serde_json::json!({"ok": true})));
        assert_eq!(outcome.kind(), OutcomeKind::Success);
    }

    #[test]
    fn test_outcome_serde_round_trip() {
        let outcome =
            ExecutionOutcome::UpstreamError { permanent: true, message: "quota".to_string() };
        let json = serde_json::to_string(&outcome).expect("serialize");
        let back: ExecutionOutcome = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(outcome, back);
    }
}
