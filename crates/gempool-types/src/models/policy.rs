//! Orchestration policy (the hot-swappable settings snapshot).

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Auto-registration policy.
///
/// When enabled, the health loop asks the Executor to provision new accounts
/// whenever the Active count drops below `min_active`, at most `max_batch`
/// per tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct AutoRegisterPolicy {
    /// Enable automatic provisioning
    pub enabled: bool,
    /// Floor of Active accounts below which provisioning is requested
    #[serde(default)]
    pub min_active: u32,
    /// Maximum registrations per health tick
    #[validate(range(min = 1_u32, max = 30_u32))]
    #[serde(default = "default_register_batch")]
    pub max_batch: u32,
}

impl Default for AutoRegisterPolicy {
    fn default() -> Self {
        Self { enabled: false, min_active: 0, max_batch: default_register_batch() }
    }
}

/// Strategy for re-balancing an account's fixed proxy binding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RebindStrategy {
    /// Never touch a binding; the account waits for its proxy to recover
    #[default]
    Sticky,
    /// Clear bindings that point at Down proxies so the account falls back
    /// to round-robin selection
    OnProxyDown,
}

/// The currently active, atomically-swappable set of orchestration tunables.
///
/// Reads are always a whole-snapshot `Arc<Policy>`; a reload swaps the whole
/// snapshot, never individual fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Policy {
    /// Maximum concurrent Executor invocations per account
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_concurrency_per_account")]
    pub concurrency_per_account: u32,
    /// Maximum concurrent Executor invocations across the pool
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_global_concurrency")]
    pub global_concurrency: u32,
    /// Cooldown after a transient failure, seconds
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Health loop period, seconds
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_probe_interval")]
    pub probe_interval_seconds: u64,
    /// Consecutive failures before auto-disable
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_auto_disable_threshold")]
    pub auto_disable_threshold: u32,
    /// Refresh attempts before a RefreshRequired account is Disabled
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_refresh_retry_budget")]
    pub refresh_retry_budget: u32,
    /// Base delay of the refresh backoff schedule, milliseconds
    #[serde(default = "default_refresh_backoff_base_ms")]
    pub refresh_backoff_base_ms: u64,
    /// Upper bound of the refresh backoff schedule, milliseconds
    #[serde(default = "default_refresh_backoff_cap_ms")]
    pub refresh_backoff_cap_ms: u64,
    /// Executor deadline per invocation, seconds
    #[validate(range(min = 1_u64, max = 3600_u64))]
    #[serde(default = "default_execute_timeout")]
    pub execute_timeout_seconds: u64,
    /// Auto-registration policy
    #[serde(default)]
    #[validate(nested)]
    pub auto_register: AutoRegisterPolicy,
    /// Proxy re-binding strategy
    #[serde(default)]
    pub rebind: RebindStrategy,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            concurrency_per_account: default_concurrency_per_account(),
            global_concurrency: default_global_concurrency(),
            cooldown_seconds: default_cooldown_seconds(),
            probe_interval_seconds: default_probe_interval(),
            auto_disable_threshold: default_auto_disable_threshold(),
            refresh_retry_budget: default_refresh_retry_budget(),
            refresh_backoff_base_ms: default_refresh_backoff_base_ms(),
            refresh_backoff_cap_ms: default_refresh_backoff_cap_ms(),
            execute_timeout_seconds: default_execute_timeout(),
            auto_register: AutoRegisterPolicy::default(),
            rebind: RebindStrategy::default(),
        }
    }
}

impl Policy {
    /// Cooldown duration in milliseconds.
    pub const fn cooldown_ms(&self) -> i64 {
        (self.cooldown_seconds * 1000) as i64
    }

    /// Executor deadline as a `Duration`.
    pub const fn execute_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.execute_timeout_seconds)
    }

    /// Health loop period as a `Duration`.
    pub const fn probe_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.probe_interval_seconds)
    }
}

const fn default_concurrency_per_account() -> u32 {
    2
}

const fn default_global_concurrency() -> u32 {
    32
}

const fn default_cooldown_seconds() -> u64 {
    300
}

const fn default_probe_interval() -> u64 {
    30
}

const fn default_auto_disable_threshold() -> u32 {
    5
}

const fn default_refresh_retry_budget() -> u32 {
    3
}

const fn default_refresh_backoff_base_ms() -> u64 {
    1000
}

const fn default_refresh_backoff_cap_ms() -> u64 {
    60_000
}

const fn default_execute_timeout() -> u64 {
    120
}

const fn default_register_batch() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(Policy::default().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let policy = Policy { concurrency_per_account: 0, ..Policy::default() };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let policy: Policy = serde_json::from_str(r#"{"cooldown_seconds": 60}"#).expect("parse");
        assert_eq!(policy.cooldown_seconds, 60);
        assert_eq!(policy.global_concurrency, default_global_concurrency());
        assert_eq!(policy.rebind, RebindStrategy::Sticky);
    }
}
