//! Account model and related types.

use serde::{Deserialize, Serialize};

use super::OutcomeKind;

/// Lifecycle status of an account.
///
/// Transitions are owned by the orchestrator's state machine; `Disabled` is
/// terminal except via explicit admin re-enable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Registered/imported but never successfully authenticated
    Pending,
    /// Eligible for dispatch
    Active,
    /// Timed suspension after a transient failure
    Cooldown,
    /// Session credential must be re-established before further use
    RefreshRequired,
    /// Out of rotation until explicit admin re-enable
    Disabled,
}

impl AccountStatus {
    /// Whether an admin override from `self` to `to` is a legal transition.
    ///
    /// Admins may pull any account out of rotation, and may re-enable a
    /// disabled one. Every other transition belongs to the dispatch/health
    /// machinery and is rejected.
    pub const fn admin_transition_allowed(self, to: AccountStatus) -> bool {
        match to {
            AccountStatus::Disabled => !matches!(self, AccountStatus::Disabled),
            AccountStatus::Active => matches!(self, AccountStatus::Disabled),
            AccountStatus::Pending | AccountStatus::Cooldown | AccountStatus::RefreshRequired => {
                false
            }
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Pending => write!(f, "pending"),
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Cooldown => write!(f, "cooldown"),
            AccountStatus::RefreshRequired => write!(f, "refresh_required"),
            AccountStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// Opaque session credential.
///
/// The secret is never logged: `Debug` is implemented by hand and the admin
/// listing only ever sees [`Credential::redacted`].
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Opaque session blob consumed by the Executor
    pub secret: String,
    /// Absolute expiry of the session, unix milliseconds (if known)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Credential {
    /// Create a credential with no known expiry.
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), expires_at: None }
    }

    /// Create a credential that expires at the given unix-ms timestamp.
    pub fn with_expiry(secret: impl Into<String>, expires_at: i64) -> Self {
        Self { secret: secret.into(), expires_at: Some(expires_at) }
    }

    /// Check if the credential is past its expiry at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|exp| now_ms >= exp)
    }

    /// Redacted rendering for the admin listing: mask plus last 4 characters.
    pub fn redacted(&self) -> String {
        let tail: String =
            self.secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("••••{tail}")
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Account data structure representing one upstream identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Session credential (opaque, never logged)
    pub credential: Credential,
    /// Current lifecycle status
    pub status: AccountStatus,
    /// Bound egress proxy name; binding is fixed once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Total requests served
    #[serde(default)]
    pub requests_served: u64,
    /// Consecutive failure count, reset on success
    #[serde(default)]
    pub consecutive_failures: u32,
    /// End of the current cooldown, unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<i64>,
    /// Kind of the last failed outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<OutcomeKind>,
    /// Reason for disable, set when status becomes Disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    /// Timestamp when the account was created, unix milliseconds
    pub created_at: i64,
    /// Timestamp when the account was last used, unix milliseconds
    pub last_used: i64,
}

impl Account {
    /// Create a new Pending account with the given credential.
    pub fn new(id: String, credential: Credential) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id,
            label: None,
            credential,
            status: AccountStatus::Pending,
            proxy: None,
            requests_served: 0,
            consecutive_failures: 0,
            cooldown_until: None,
            last_error: None,
            disabled_reason: None,
            created_at: now,
            last_used: now,
        }
    }

    /// Record a served request at `now_ms`.
    pub fn mark_used(&mut self, now_ms: i64) {
        self.requests_served = self.requests_served.saturating_add(1);
        self.last_used = now_ms;
    }

    /// Disable the account with a reason.
    pub fn disable(&mut self, reason: impl Into<String>) {
        self.status = AccountStatus::Disabled;
        self.disabled_reason = Some(reason.into());
        self.cooldown_until = None;
    }

    /// Reset failure bookkeeping (on successful refresh or admin re-enable).
    pub fn reset_counters(&mut self) {
        self.consecutive_failures = 0;
        self.cooldown_until = None;
        self.last_error = None;
        self.disabled_reason = None;
    }

    /// Whether the cooldown has elapsed at `now_ms`.
    pub fn cooldown_elapsed(&self, now_ms: i64) -> bool {
        self.cooldown_until.is_none_or(|until| now_ms >= until)
    }
}

/// Listing projection of an account for the admin surface.
///
/// Carries everything an operator needs while keeping the credential
/// redacted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountView {
    /// Unique identifier
    pub id: String,
    /// Optional display label
    pub label: Option<String>,
    /// Current lifecycle status
    pub status: AccountStatus,
    /// Bound proxy name, if any
    pub proxy: Option<String>,
    /// Total requests served
    pub requests_served: u64,
    /// Consecutive failure count
    pub consecutive_failures: u32,
    /// Redacted credential (mask + last 4 characters)
    pub credential_redacted: String,
    /// Kind of the last failed outcome
    pub last_error: Option<OutcomeKind>,
    /// Reason for disable, if disabled
    pub disabled_reason: Option<String>,
    /// Last-used timestamp, unix milliseconds
    pub last_used: i64,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            label: account.label.clone(),
            status: account.status,
            proxy: account.proxy.clone(),
            requests_served: account.requests_served,
            consecutive_failures: account.consecutive_failures,
            credential_redacted: account.credential.redacted(),
            last_error: account.last_error,
            disabled_reason: account.disabled_reason.clone(),
            last_used: account.last_used,
        }
    }
}
