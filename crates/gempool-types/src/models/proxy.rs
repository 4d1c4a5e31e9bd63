//! Proxy (egress endpoint) models.

use serde::{Deserialize, Serialize};

/// Liveness of an egress endpoint.
///
/// A Down proxy is never selected until a probe marks it Up again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProxyLiveness {
    /// Probed reachable; eligible for selection
    Up,
    /// Failed in flight or under probe; excluded from selection
    Down,
}

/// Configured egress endpoint, as supplied by configuration reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Stable name used for account binding and events
    pub name: String,
    /// Egress URL (socks5/http scheme)
    pub url: String,
}

/// Runtime state of one egress endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proxy {
    /// Stable name
    pub name: String,
    /// Egress URL
    pub url: String,
    /// Current liveness
    pub liveness: ProxyLiveness,
    /// Timestamp of the last probe, unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,
    /// Consecutive failed probes since last Up
    #[serde(default)]
    pub consecutive_probe_failures: u32,
}

impl Proxy {
    /// Create a new proxy in the Up state from its configured endpoint.
    pub fn new(endpoint: ProxyEndpoint) -> Self {
        Self {
            name: endpoint.name,
            url: endpoint.url,
            liveness: ProxyLiveness::Up,
            last_checked: None,
            consecutive_probe_failures: 0,
        }
    }

    /// Whether this proxy may be handed out.
    pub const fn is_up(&self) -> bool {
        matches!(self.liveness, ProxyLiveness::Up)
    }
}
