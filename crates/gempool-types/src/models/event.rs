//! Structured observability events.

use serde::{Deserialize, Serialize};

use super::OutcomeKind;

/// One event per completed dispatch, handed to the observability sink.
///
/// Fire-and-forget: producing this must never block or fail the request
/// path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorEvent {
    /// Account that served (or failed) the request
    pub account_id: String,
    /// Proxy the request was routed through, if any
    pub proxy: Option<String>,
    /// Classified outcome
    pub outcome: OutcomeKind,
    /// Wall-clock latency of the Executor invocation, milliseconds
    pub latency_ms: u64,
}
