//! The Dispatcher: selection, admission, invocation, outcome policy.

mod admission;
mod selection;

use std::sync::Arc;
use std::time::Instant;

use gempool_types::error::{OrchestratorError, PersistError};
use gempool_types::models::{
    Account, AccountStatus, AccountView, ExecutionOutcome, OrchestratorEvent, Payload, Policy,
    ProxyEndpoint, Task,
};
use validator::Validate;

use crate::events::EventSink;
use crate::executor::Executor;
use crate::persist::Persistence;
use crate::settings::SettingsStore;
use crate::store::{AccountStore, ProxyPool};

pub(crate) use admission::{AdmissionGuard, SlotTable};

/// The orchestrator root.
///
/// On each inbound unit of work it selects an eligible (account, proxy)
/// pair under a consistent snapshot, acquires admission slots, invokes the
/// Executor with a deadline, classifies the outcome, updates the stores, and
/// returns a typed result. The [`crate::HealthMonitor`] mutates the same
/// stores concurrently under the same entry-scoped discipline.
pub struct Orchestrator {
    pub(crate) accounts: Arc<AccountStore>,
    pub(crate) proxies: Arc<ProxyPool>,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) events: Arc<dyn EventSink>,
    slots: SlotTable,
}

impl Orchestrator {
    /// Wire an orchestrator from already-loaded state.
    pub fn new(
        accounts: Vec<Account>,
        policy: Policy,
        endpoints: Vec<ProxyEndpoint>,
        executor: Arc<dyn Executor>,
        persistence: Arc<dyn Persistence>,
        events: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            accounts: Arc::new(AccountStore::from_accounts(accounts)),
            proxies: Arc::new(ProxyPool::new(endpoints)),
            settings: Arc::new(SettingsStore::new(policy)),
            executor,
            persistence,
            events,
            slots: SlotTable::new(),
        })
    }

    /// Load state from persistence and wire the orchestrator.
    ///
    /// Persistence unavailable here is fatal: without accounts and a policy
    /// there is nothing to serve.
    pub async fn load(
        executor: Arc<dyn Executor>,
        persistence: Arc<dyn Persistence>,
        events: Arc<dyn EventSink>,
        endpoints: Vec<ProxyEndpoint>,
    ) -> Result<Arc<Self>, PersistError> {
        let policy = persistence.load_policy().await?;
        policy.validate().map_err(|e| PersistError::InvalidPolicy { message: e.to_string() })?;
        let accounts = persistence.load_accounts().await?;
        tracing::info!(
            "orchestrator loaded: {} account(s), {} proxy endpoint(s)",
            accounts.len(),
            endpoints.len()
        );
        Ok(Self::new(accounts, policy, endpoints, executor, persistence, events))
    }

    /// The primary serving path.
    ///
    /// Never retries the Executor internally and never queues: if no
    /// eligible pair exists right now the caller gets `PoolExhausted` and
    /// decides whether to come back.
    pub async fn execute(&self, task: Task) -> Result<Payload, OrchestratorError> {
        let policy = self.settings.current();

        let candidates = selection::rank_candidates(
            self.accounts.snapshot(),
            policy.concurrency_per_account,
            |id| self.slots.active_for(id),
        );
        if candidates.is_empty() {
            return Err(OrchestratorError::PoolExhausted {
                reason: "no active account below its concurrency cap".to_string(),
            });
        }

        let mut selected: Option<(Account, Option<(String, String)>, AdmissionGuard)> = None;
        for candidate in candidates {
            // Binding is fixed; unbound accounts round-robin over the Up set.
            let egress = match &candidate.proxy {
                Some(bound) => match self.proxies.url_of(bound) {
                    Some(url) if self.proxies.is_up(bound) => Some((bound.clone(), url)),
                    _ => continue,
                },
                None if self.proxies.is_empty() => None,
                None => match self.proxies.next_up() {
                    Some(proxy) => Some((proxy.name, proxy.url)),
                    None => continue,
                },
            };

            if let Some(guard) = AdmissionGuard::try_acquire(
                &self.slots,
                &candidate.id,
                policy.concurrency_per_account,
                policy.global_concurrency,
            ) {
                selected = Some((candidate, egress, guard));
                break;
            }
        }

        let Some((account, egress, guard)) = selected else {
            return Err(OrchestratorError::PoolExhausted {
                reason: "no admission slot or live egress for any candidate".to_string(),
            });
        };

        let deadline = policy.execute_timeout();
        let proxy_url = egress.as_ref().map(|(_, url)| url.clone());
        let started = Instant::now();

        let outcome = match tokio::time::timeout(
            deadline,
            self.executor.run(&account.credential, proxy_url.as_deref(), &task, deadline),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ExecutionOutcome::Timeout,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let new_status = self.accounts.apply_outcome(&account.id, &outcome, &policy, now_ms);
        if let Some(status) = new_status {
            if status != account.status {
                tracing::debug!(
                    "account {} {} -> {} ({})",
                    account.id,
                    account.status,
                    status,
                    outcome.kind()
                );
            }
        }

        if matches!(outcome, ExecutionOutcome::NetworkError { .. }) {
            if let Some((name, _)) = &egress {
                self.proxies.mark_down(name);
            }
        }

        self.events.emit(OrchestratorEvent {
            account_id: account.id.clone(),
            proxy: egress.map(|(name, _)| name),
            outcome: outcome.kind(),
            latency_ms,
        });

        drop(guard);

        match outcome {
            ExecutionOutcome::Success(payload) => Ok(payload),
            ExecutionOutcome::Timeout => {
                Err(OrchestratorError::Timeout { duration_secs: policy.execute_timeout_seconds })
            }
            ExecutionOutcome::UpstreamError { permanent: true, message } => {
                Err(OrchestratorError::UpstreamRejected { message })
            }
            other => Err(OrchestratorError::Retryable { kind: other.kind() }),
        }
    }

    /// Admin listing with redacted credentials.
    pub fn list_accounts(&self) -> Vec<AccountView> {
        let mut snapshot = self.accounts.snapshot();
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        snapshot.iter().map(AccountView::from).collect()
    }

    /// Admin override, validated against the state machine's legal
    /// transitions. Re-enable resets counters.
    pub async fn set_account_status(
        &self,
        id: &str,
        status: AccountStatus,
    ) -> Result<(), OrchestratorError> {
        let applied = self.accounts.with_account(id, |account| {
            if !account.status.admin_transition_allowed(status) {
                return Err(OrchestratorError::IllegalTransition {
                    from: account.status,
                    to: status,
                });
            }
            // Only Disabled and Active survive the legality check.
            if status == AccountStatus::Disabled {
                account.disable("admin action");
            } else {
                account.reset_counters();
                account.status = AccountStatus::Active;
            }
            Ok(())
        });

        match applied {
            None => Err(OrchestratorError::AccountNotFound { id: id.to_string() }),
            Some(Err(e)) => Err(e),
            Some(Ok(())) => {
                tracing::info!("account {} set to {} by admin", id, status);
                self.persist_accounts().await;
                Ok(())
            }
        }
    }

    /// Swap in a new policy after validation and persist it.
    pub async fn reload_policy(&self, policy: Policy) -> Result<(), PersistError> {
        policy.validate().map_err(|e| PersistError::InvalidPolicy { message: e.to_string() })?;
        if let Err(e) = self.persistence.save_policy(&policy).await {
            tracing::warn!("policy persistence failed: {}", e);
        }
        self.settings.reload(policy);
        Ok(())
    }

    /// Import an account (admin upload). Replaces any existing record with
    /// the same id.
    pub async fn import_account(&self, account: Account) {
        tracing::info!("account {} imported ({})", account.id, account.status);
        self.accounts.insert(account);
        self.persist_accounts().await;
    }

    /// Remove an account (explicit admin delete).
    pub async fn remove_account(&self, id: &str) -> Result<(), OrchestratorError> {
        match self.accounts.remove(id) {
            Some(_) => {
                tracing::info!("account {} removed", id);
                self.persist_accounts().await;
                Ok(())
            }
            None => Err(OrchestratorError::AccountNotFound { id: id.to_string() }),
        }
    }

    /// Replace the configured egress endpoints.
    pub fn reload_proxies(&self, endpoints: Vec<ProxyEndpoint>) {
        self.proxies.reload(endpoints);
    }

    /// Current policy snapshot (read-only convenience for callers).
    pub fn policy(&self) -> Arc<Policy> {
        self.settings.current()
    }

    /// The account catalog (shared with the health monitor).
    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    /// The proxy pool (shared with the health monitor).
    pub fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    /// Best-effort account persistence; failures are logged, not fatal
    /// (startup is the only fatal persistence point).
    pub(crate) async fn persist_accounts(&self) {
        let snapshot = self.accounts.snapshot();
        if let Err(e) = self.persistence.save_accounts(&snapshot).await {
            tracing::warn!("account persistence failed: {}", e);
        }
    }
}
