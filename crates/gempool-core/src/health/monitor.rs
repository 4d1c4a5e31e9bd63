//! Health monitor: the single background loop driving automatic recovery.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use gempool_types::models::{Account, AccountStatus, Policy, RebindStrategy};
use tokio::sync::watch;

use super::backoff;
use super::probe::ProxyProber;
use crate::executor::Executor;
use crate::orchestrator::Orchestrator;
use crate::persist::Persistence;
use crate::settings::SettingsStore;
use crate::store::{AccountStore, ProxyPool};

/// Per-account refresh bookkeeping (attempt counter + earliest next try).
#[derive(Debug, Clone, Copy, Default)]
struct RefreshState {
    attempts: u32,
    next_attempt_at_ms: i64,
}

/// Background loop that probes proxies and drives account state
/// transitions: cooldown recovery, credential refresh with bounded backoff,
/// expiry sweeps, and auto-registration.
///
/// All mutations go through the same stores and entry-scoped discipline as
/// the Dispatcher; there is no separate fast path.
pub struct HealthMonitor {
    accounts: Arc<AccountStore>,
    proxies: Arc<ProxyPool>,
    settings: Arc<SettingsStore>,
    executor: Arc<dyn Executor>,
    persistence: Arc<dyn Persistence>,
    prober: Arc<dyn ProxyProber>,
    refresh_state: DashMap<String, RefreshState>,
    shutdown_tx: watch::Sender<bool>,
}

impl HealthMonitor {
    /// Build a monitor sharing the orchestrator's stores and collaborators.
    pub fn new(orchestrator: &Arc<Orchestrator>, prober: Arc<dyn ProxyProber>) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            accounts: Arc::clone(&orchestrator.accounts),
            proxies: Arc::clone(&orchestrator.proxies),
            settings: Arc::clone(&orchestrator.settings),
            executor: Arc::clone(&orchestrator.executor),
            persistence: Arc::clone(&orchestrator.persistence),
            prober,
            refresh_state: DashMap::new(),
            shutdown_tx,
        })
    }

    /// Start the background loop. The period is re-read from the policy
    /// snapshot on every turn, so a reload takes effect at the next tick.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tracing::info!("✅ health monitor started");
            loop {
                let interval = monitor.settings.current().probe_interval();
                tokio::select! {
                    () = tokio::time::sleep(interval) => {
                        monitor.run_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("health monitor shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the background loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One full tick, callable synchronously (tests drive this directly).
    pub async fn run_once(&self) {
        let policy = self.settings.current();
        let now_ms = chrono::Utc::now().timestamp_millis();

        self.probe_down_proxies().await;

        let mut dirty = self.recover_cooldowns(now_ms);
        dirty |= self.sweep_expired_credentials(now_ms);
        dirty |= self.refresh_accounts(&policy, now_ms).await;
        dirty |= self.rebind_orphans(&policy);
        dirty |= self.auto_register(&policy).await;

        if dirty {
            let snapshot = self.accounts.snapshot();
            if let Err(e) = self.persistence.save_accounts(&snapshot).await {
                tracing::warn!("account persistence failed: {}", e);
            }
        }
    }

    /// (a) probe each Down proxy; success is the only path back to Up.
    async fn probe_down_proxies(&self) {
        for name in self.proxies.down_names() {
            let Some(proxy) = self.proxies.list().into_iter().find(|p| p.name == name) else {
                continue;
            };
            match self.prober.probe(&proxy).await {
                Ok(()) => self.proxies.mark_up(&name),
                Err(e) => {
                    tracing::debug!("proxy {} still down: {}", name, e);
                    self.proxies.mark_down(&name);
                }
            }
        }
    }

    /// (b) move Cooldown accounts whose suspension elapsed back to Active.
    fn recover_cooldowns(&self, now_ms: i64) -> bool {
        let mut dirty = false;
        for account in self.accounts.snapshot() {
            if account.status != AccountStatus::Cooldown || !account.cooldown_elapsed(now_ms) {
                continue;
            }
            self.accounts.with_account(&account.id, |acc| {
                if acc.status == AccountStatus::Cooldown && acc.cooldown_elapsed(now_ms) {
                    acc.status = AccountStatus::Active;
                    acc.cooldown_until = None;
                    tracing::info!("🔄 account {} recovered from cooldown", acc.id);
                    dirty = true;
                }
            });
        }
        dirty
    }

    /// (f) route accounts with expired credentials to refresh.
    fn sweep_expired_credentials(&self, now_ms: i64) -> bool {
        let mut dirty = false;
        for account in self.accounts.snapshot() {
            let stale = matches!(account.status, AccountStatus::Active | AccountStatus::Cooldown)
                && account.credential.is_expired(now_ms);
            if !stale {
                continue;
            }
            self.accounts.with_account(&account.id, |acc| {
                if matches!(acc.status, AccountStatus::Active | AccountStatus::Cooldown) {
                    acc.status = AccountStatus::RefreshRequired;
                    acc.cooldown_until = None;
                    tracing::info!("account {} credential expired, refresh required", acc.id);
                    dirty = true;
                }
            });
        }
        dirty
    }

    /// (c) + (e) re-authenticate RefreshRequired accounts and first-auth
    /// Pending ones, with a bounded retry budget and exponential backoff.
    async fn refresh_accounts(&self, policy: &Policy, now_ms: i64) -> bool {
        let mut dirty = false;
        let pending: Vec<Account> = self
            .accounts
            .snapshot()
            .into_iter()
            .filter(|a| {
                matches!(a.status, AccountStatus::RefreshRequired | AccountStatus::Pending)
            })
            .collect();

        let pending_ids: HashSet<String> = pending.iter().map(|a| a.id.clone()).collect();
        self.refresh_state.retain(|id, _| pending_ids.contains(id));

        for account in pending {
            let state =
                self.refresh_state.get(&account.id).map(|entry| *entry).unwrap_or_default();
            if now_ms < state.next_attempt_at_ms {
                continue;
            }

            match self.executor.refresh(&account.credential).await {
                Ok(credential) => {
                    self.accounts.with_account(&account.id, |acc| {
                        acc.credential = credential;
                        acc.reset_counters();
                        acc.status = AccountStatus::Active;
                    });
                    self.refresh_state.remove(&account.id);
                    tracing::info!(
                        "✅ account {} authenticated ({})",
                        account.id,
                        if account.status == AccountStatus::Pending {
                            "first auth"
                        } else {
                            "refresh"
                        }
                    );
                    dirty = true;
                }
                Err(e) => {
                    let attempts = state.attempts + 1;
                    if attempts >= policy.refresh_retry_budget {
                        self.accounts.with_account(&account.id, |acc| {
                            acc.disable(format!("refresh retry budget exhausted: {e}"));
                        });
                        self.refresh_state.remove(&account.id);
                        tracing::warn!(
                            "⛔ account {} disabled after {} failed refresh attempt(s)",
                            account.id,
                            attempts
                        );
                        dirty = true;
                    } else {
                        let delay = backoff::with_jitter(backoff::delay_for_attempt(
                            attempts,
                            policy.refresh_backoff_base_ms,
                            policy.refresh_backoff_cap_ms,
                        ));
                        self.refresh_state.insert(
                            account.id.clone(),
                            RefreshState {
                                attempts,
                                next_attempt_at_ms: now_ms + delay.as_millis() as i64,
                            },
                        );
                        tracing::warn!(
                            "account {} refresh failed (attempt {}/{}), next in {:?}: {}",
                            account.id,
                            attempts,
                            policy.refresh_retry_budget,
                            delay,
                            e
                        );
                    }
                }
            }
        }
        dirty
    }

    /// (g) optional re-balancing: clear bindings that point at Down proxies.
    fn rebind_orphans(&self, policy: &Policy) -> bool {
        if policy.rebind != RebindStrategy::OnProxyDown {
            return false;
        }
        let mut dirty = false;
        for account in self.accounts.snapshot() {
            let Some(bound) = account.proxy.clone() else { continue };
            if self.proxies.is_up(&bound) {
                continue;
            }
            self.accounts.with_account(&account.id, |acc| {
                if acc.proxy.as_deref() == Some(bound.as_str()) {
                    acc.proxy = None;
                    tracing::info!("account {} unbound from down proxy {}", acc.id, bound);
                    dirty = true;
                }
            });
        }
        dirty
    }

    /// (d) keep the Active count at the configured floor by provisioning
    /// new Pending accounts through the Executor.
    async fn auto_register(&self, policy: &Policy) -> bool {
        if !policy.auto_register.enabled {
            return false;
        }
        let active = self.accounts.count_status(AccountStatus::Active) as u32;
        // Pending accounts are provisioned supply awaiting first auth; count
        // them so a slow auth pipeline does not trigger runaway registration.
        let supply = active + self.accounts.count_status(AccountStatus::Pending) as u32;
        if active >= policy.auto_register.min_active || supply >= policy.auto_register.min_active {
            return false;
        }
        let need =
            (policy.auto_register.min_active - supply).min(policy.auto_register.max_batch.max(1));
        tracing::info!(
            "pool below floor ({} active < {}), registering {} account(s)",
            active,
            policy.auto_register.min_active,
            need
        );

        let mut dirty = false;
        for _ in 0..need {
            match self.executor.register().await {
                Ok(registered) => {
                    let mut account =
                        Account::new(uuid::Uuid::new_v4().to_string(), registered.credential);
                    account.label = registered.label;
                    account.proxy = self.least_bound_up_proxy();
                    tracing::info!("account {} registered (pending first auth)", account.id);
                    self.accounts.insert(account);
                    dirty = true;
                }
                Err(e) => {
                    // One failure likely means the next call fails too; wait
                    // for the next tick instead of hammering the provider.
                    tracing::warn!("auto-registration failed: {}", e);
                    break;
                }
            }
        }
        dirty
    }

    /// Up proxy bound to the fewest accounts (ties broken by name).
    fn least_bound_up_proxy(&self) -> Option<String> {
        let up = self.proxies.list_up();
        if up.is_empty() {
            return None;
        }
        let mut counts: HashMap<String, usize> =
            up.into_iter().map(|p| (p.name, 0)).collect();
        for account in self.accounts.snapshot() {
            if let Some(bound) = account.proxy {
                if let Some(count) = counts.get_mut(&bound) {
                    *count += 1;
                }
            }
        }
        counts
            .into_iter()
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(name, _)| name)
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gempool_types::error::ProxyError;
    use gempool_types::models::{Credential, Proxy, ProxyEndpoint};

    use crate::events::TracingSink;
    use crate::testkit::{MemoryPersistence, ScriptedExecutor};

    struct StaticProber(bool);

    #[async_trait]
    impl ProxyProber for StaticProber {
        async fn probe(&self, proxy: &Proxy) -> Result<(), ProxyError> {
            if self.0 {
                Ok(())
            } else {
                Err(ProxyError::ProbeFailed {
                    name: proxy.name.clone(),
                    message: "unreachable".to_string(),
                })
            }
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        executor: Arc<ScriptedExecutor>,
        persistence: Arc<MemoryPersistence>,
    }

    fn make_harness(
        accounts: Vec<Account>,
        policy: Policy,
        endpoints: Vec<ProxyEndpoint>,
    ) -> Harness {
        let executor = ScriptedExecutor::new();
        let persistence = MemoryPersistence::with_policy(policy.clone());
        let orchestrator = Orchestrator::new(
            accounts,
            policy,
            endpoints,
            executor.clone(),
            persistence.clone(),
            Arc::new(TracingSink),
        );
        Harness { orchestrator, executor, persistence }
    }

    fn monitor_with(harness: &Harness, probe_ok: bool) -> Arc<HealthMonitor> {
        HealthMonitor::new(&harness.orchestrator, Arc::new(StaticProber(probe_ok)))
    }

    fn make_account(id: &str, status: AccountStatus) -> Account {
        let mut account = Account::new(id.to_string(), Credential::new(format!("cred-{id}")));
        account.status = status;
        account
    }

    fn endpoint(name: &str) -> ProxyEndpoint {
        ProxyEndpoint { name: name.to_string(), url: format!("socks5://{name}:1080") }
    }

    fn fast_refresh_policy(budget: u32) -> Policy {
        Policy {
            refresh_retry_budget: budget,
            refresh_backoff_base_ms: 0,
            refresh_backoff_cap_ms: 0,
            ..Policy::default()
        }
    }

    #[tokio::test]
    async fn test_elapsed_cooldown_recovers() {
        let now = chrono::Utc::now().timestamp_millis();
        let mut elapsed = make_account("elapsed", AccountStatus::Cooldown);
        elapsed.cooldown_until = Some(now - 1_000);
        let mut waiting = make_account("waiting", AccountStatus::Cooldown);
        waiting.cooldown_until = Some(now + 60_000);

        let harness = make_harness(vec![elapsed, waiting], Policy::default(), vec![]);
        let monitor = monitor_with(&harness, true);

        monitor.run_once().await;

        let accounts = harness.orchestrator.accounts.snapshot();
        let status_of = |id: &str| accounts.iter().find(|a| a.id == id).map(|a| a.status);
        assert_eq!(status_of("elapsed"), Some(AccountStatus::Active));
        assert_eq!(status_of("waiting"), Some(AccountStatus::Cooldown));
    }

    #[tokio::test]
    async fn test_refresh_budget_exhaustion_disables() {
        let harness = make_harness(
            vec![make_account("b", AccountStatus::RefreshRequired)],
            fast_refresh_policy(3),
            vec![],
        );
        for _ in 0..3 {
            harness.executor.push_refresh(Err(gempool_types::error::AccountError::RefreshFailed {
                id: "b".to_string(),
                message: "revoked".to_string(),
            }));
        }
        let monitor = monitor_with(&harness, true);

        for _ in 0..3 {
            monitor.run_once().await;
        }

        let account = harness.orchestrator.accounts.get("b").expect("account");
        assert_eq!(account.status, AccountStatus::Disabled);
        assert_eq!(harness.executor.refresh_calls(), 3);
        assert!(account.disabled_reason.as_deref().unwrap_or("").contains("budget"));
    }

    #[tokio::test]
    async fn test_pending_first_auth_activates() {
        let harness = make_harness(
            vec![make_account("p", AccountStatus::Pending)],
            fast_refresh_policy(3),
            vec![],
        );
        let monitor = monitor_with(&harness, true);

        monitor.run_once().await;

        let account = harness.orchestrator.accounts.get("p").expect("account");
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.credential.secret, "cred-p-refreshed");
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed_in_one_tick() {
        let now = chrono::Utc::now().timestamp_millis();
        let mut account = make_account("e", AccountStatus::Active);
        account.credential = Credential::with_expiry("old-session", now - 1);

        let harness = make_harness(vec![account], fast_refresh_policy(3), vec![]);
        let monitor = monitor_with(&harness, true);

        monitor.run_once().await;

        let account = harness.orchestrator.accounts.get("e").expect("account");
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.credential.secret, "old-session-refreshed");
    }

    #[tokio::test]
    async fn test_probe_recovers_down_proxy() {
        let harness = make_harness(vec![], Policy::default(), vec![endpoint("p1")]);
        harness.orchestrator.proxies.mark_down("p1");

        monitor_with(&harness, false).run_once().await;
        assert!(!harness.orchestrator.proxies.is_up("p1"), "failed probe keeps proxy down");

        monitor_with(&harness, true).run_once().await;
        assert!(harness.orchestrator.proxies.is_up("p1"));
    }

    #[tokio::test]
    async fn test_auto_register_fills_to_floor() {
        let policy = Policy {
            auto_register: gempool_types::models::AutoRegisterPolicy {
                enabled: true,
                min_active: 2,
                max_batch: 5,
            },
            ..Policy::default()
        };
        let harness = make_harness(vec![], policy, vec![endpoint("p1")]);
        let monitor = monitor_with(&harness, true);

        monitor.run_once().await;

        assert_eq!(harness.executor.register_calls(), 2);
        let accounts = harness.orchestrator.accounts.snapshot();
        // Registered in this tick as Pending, then first-authenticated by the
        // same tick's refresh pass or left Pending for the next one; either
        // way both exist and are bound to the only proxy.
        assert_eq!(accounts.len(), 2);
        for account in &accounts {
            assert_eq!(account.proxy.as_deref(), Some("p1"));
        }
        assert_eq!(harness.persistence.saved_accounts().len(), 2);
    }

    #[tokio::test]
    async fn test_rebind_on_proxy_down_clears_binding() {
        let policy = Policy { rebind: RebindStrategy::OnProxyDown, ..Policy::default() };
        let mut account = make_account("a", AccountStatus::Active);
        account.proxy = Some("p1".to_string());

        let harness = make_harness(vec![account], policy, vec![endpoint("p1")]);
        harness.orchestrator.proxies.mark_down("p1");
        let monitor = monitor_with(&harness, false);

        monitor.run_once().await;

        let account = harness.orchestrator.accounts.get("a").expect("account");
        assert_eq!(account.proxy, None);
    }

    #[tokio::test]
    async fn test_sticky_binding_is_never_cleared() {
        let mut account = make_account("a", AccountStatus::Active);
        account.proxy = Some("p1".to_string());

        let harness = make_harness(vec![account], Policy::default(), vec![endpoint("p1")]);
        harness.orchestrator.proxies.mark_down("p1");
        let monitor = monitor_with(&harness, false);

        monitor.run_once().await;

        let account = harness.orchestrator.accounts.get("a").expect("account");
        assert_eq!(account.proxy.as_deref(), Some("p1"));
    }
}
