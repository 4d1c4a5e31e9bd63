//! Account catalog and the outcome-driven state machine.

use dashmap::DashMap;
use gempool_types::models::{Account, AccountStatus, ExecutionOutcome, Policy};

/// Durable catalog of accounts; owned exclusively by the orchestrator for
/// writes.
///
/// Backed by a sharded map so that mutation of one account never contends
/// with unrelated accounts. Every read-modify-write goes through
/// [`AccountStore::with_account`], keeping the critical section to a single
/// entry.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: DashMap<String, Account>,
}

impl AccountStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { accounts: DashMap::new() }
    }

    /// Create a store seeded from persisted accounts.
    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.accounts.insert(account.id.clone(), account);
        }
        store
    }

    /// Insert or replace an account.
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Remove an account, returning it if present.
    pub fn remove(&self, id: &str) -> Option<Account> {
        self.accounts.remove(id).map(|(_, account)| account)
    }

    /// Clone one account out of the store.
    pub fn get(&self, id: &str) -> Option<Account> {
        self.accounts.get(id).map(|entry| entry.clone())
    }

    /// Consistent point-in-time copy of the whole catalog.
    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of accounts in the given status.
    pub fn count_status(&self, status: AccountStatus) -> usize {
        self.accounts.iter().filter(|entry| entry.value().status == status).count()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Run `f` against one account under its entry lock.
    ///
    /// Returns `None` if the account does not exist. This is the only
    /// mutation path; callers must not hold the returned guard beyond `f`.
    pub fn with_account<T>(&self, id: &str, f: impl FnOnce(&mut Account) -> T) -> Option<T> {
        self.accounts.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// Apply one execution outcome to an account per the state machine,
    /// returning the resulting status.
    pub fn apply_outcome(
        &self,
        id: &str,
        outcome: &ExecutionOutcome,
        policy: &Policy,
        now_ms: i64,
    ) -> Option<AccountStatus> {
        self.with_account(id, |account| {
            apply_outcome(account, outcome, policy, now_ms);
            account.status
        })
    }
}

/// The deterministic outcome → transition function (spec table).
///
/// Only accounts that were Active at selection time receive outcomes, but
/// the function is total over statuses so replays and admin races stay
/// well-defined.
pub fn apply_outcome(
    account: &mut Account,
    outcome: &ExecutionOutcome,
    policy: &Policy,
    now_ms: i64,
) {
    match outcome {
        ExecutionOutcome::Success(_) => {
            account.consecutive_failures = 0;
            account.cooldown_until = None;
            account.last_error = None;
            account.mark_used(now_ms);
        }
        ExecutionOutcome::AuthExpired => {
            account.last_error = Some(outcome.kind());
            account.mark_used(now_ms);
            match account.status {
                AccountStatus::Active | AccountStatus::Cooldown => {
                    account.status = AccountStatus::RefreshRequired;
                    account.cooldown_until = None;
                }
                AccountStatus::Pending
                | AccountStatus::RefreshRequired
                | AccountStatus::Disabled => {}
            }
        }
        ExecutionOutcome::UpstreamError { permanent: true, message } => {
            account.last_error = Some(outcome.kind());
            account.mark_used(now_ms);
            account.consecutive_failures = account.consecutive_failures.saturating_add(1);
            account.disable(format!("permanent upstream error: {message}"));
        }
        ExecutionOutcome::RateLimited { .. }
        | ExecutionOutcome::UpstreamError { permanent: false, .. }
        | ExecutionOutcome::NetworkError { .. }
        | ExecutionOutcome::Timeout => {
            account.last_error = Some(outcome.kind());
            account.mark_used(now_ms);
            account.consecutive_failures = account.consecutive_failures.saturating_add(1);

            if account.status == AccountStatus::Disabled {
                return;
            }

            if account.consecutive_failures >= policy.auto_disable_threshold {
                account.disable(format!(
                    "failure threshold exceeded ({} consecutive)",
                    account.consecutive_failures
                ));
                return;
            }

            // RefreshRequired outranks Cooldown: a throttled response on a
            // stale session still needs re-auth first.
            if account.status != AccountStatus::RefreshRequired {
                let cooldown_ms = match outcome {
                    ExecutionOutcome::RateLimited { retry_after_ms: Some(ms) } => {
                        (*ms as i64).max(policy.cooldown_ms())
                    }
                    _ => policy.cooldown_ms(),
                };
                account.status = AccountStatus::Cooldown;
                account.cooldown_until = Some(now_ms + cooldown_ms);
            }
        }
    }
}
