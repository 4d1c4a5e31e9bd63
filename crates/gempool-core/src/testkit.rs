//! Test support: a scripted Executor and in-memory Persistence.
//!
//! Used by this crate's unit and integration tests; kept in the library so
//! downstream crates can exercise their wiring against a deterministic
//! upstream without network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use gempool_types::error::{AccountError, PersistError};
use gempool_types::models::{Account, Credential, ExecutionOutcome, Payload, Policy, Task};
use parking_lot::Mutex;

use crate::executor::{Executor, RegisteredAccount};
use crate::persist::Persistence;

/// Deterministic Executor driven by queues of scripted results.
///
/// Outcomes default to Success when the script runs dry. `run` entries are
/// instrumented per credential so tests can assert the at-most-one-
/// concurrent-use invariant, and executions can be held open behind a
/// semaphore to create controlled contention.
#[derive(Default)]
pub struct ScriptedExecutor {
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    refresh_results: Mutex<VecDeque<Result<Credential, AccountError>>>,
    register_results: Mutex<VecDeque<Result<RegisteredAccount, AccountError>>>,
    hold: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
    in_flight: DashMap<String, AtomicU32>,
    max_in_flight: DashMap<String, u32>,
    run_calls: AtomicU32,
    refresh_calls: AtomicU32,
    register_calls: AtomicU32,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the next `run` outcome.
    pub fn push_outcome(&self, outcome: ExecutionOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Queue the next `refresh` result.
    pub fn push_refresh(&self, result: Result<Credential, AccountError>) {
        self.refresh_results.lock().push_back(result);
    }

    /// Queue the next `register` result.
    pub fn push_register(&self, result: Result<RegisteredAccount, AccountError>) {
        self.register_results.lock().push_back(result);
    }

    /// Hold every subsequent `run` open until permits are added to the
    /// returned semaphore (one permit releases one execution).
    pub fn hold_executions(&self) -> Arc<tokio::sync::Semaphore> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(0));
        *self.hold.lock() = Some(Arc::clone(&semaphore));
        semaphore
    }

    /// Stop holding executions and release anything waiting.
    pub fn release_executions(&self) {
        if let Some(semaphore) = self.hold.lock().take() {
            semaphore.add_permits(1024);
        }
    }

    pub fn run_calls(&self) -> u32 {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> u32 {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `run` entries observed for the given
    /// credential secret.
    pub fn max_concurrent_for(&self, credential_secret: &str) -> u32 {
        self.max_in_flight.get(credential_secret).map(|v| *v).unwrap_or(0)
    }

    fn enter(&self, key: &str) -> FlightGuard<'_> {
        let current = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| AtomicU32::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        self.max_in_flight
            .entry(key.to_string())
            .and_modify(|max| *max = (*max).max(current))
            .or_insert(current);
        FlightGuard { executor: self, key: key.to_string() }
    }
}

/// Decrements the in-flight counter even if the execution is cancelled.
struct FlightGuard<'a> {
    executor: &'a ScriptedExecutor,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(counter) = self.executor.in_flight.get(&self.key) {
            let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                if v > 0 {
                    Some(v - 1)
                } else {
                    None
                }
            });
        }
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(
        &self,
        credential: &Credential,
        _proxy_url: Option<&str>,
        _task: &Task,
        _deadline: Duration,
    ) -> ExecutionOutcome {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(&credential.secret);

        let gate = self.hold.lock().clone();
        if let Some(semaphore) = gate {
            if let Ok(permit) = semaphore.acquire().await {
                permit.forget();
            }
        }

        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| ExecutionOutcome::Success(Payload(serde_json::json!({"ok": true}))))
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, AccountError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Credential::new(format!("{}-refreshed", credential.secret))))
    }

    async fn register(&self) -> Result<RegisteredAccount, AccountError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.register_results.lock().pop_front().unwrap_or_else(|| {
            Ok(RegisteredAccount {
                credential: Credential::new(format!(
                    "registered-{}",
                    self.register_calls.load(Ordering::SeqCst)
                )),
                label: None,
            })
        })
    }
}

/// In-memory Persistence with a switch to simulate an unavailable store.
#[derive(Default)]
pub struct MemoryPersistence {
    accounts: Mutex<Vec<Account>>,
    policy: Mutex<Option<Policy>>,
    unavailable: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Persistence pre-seeded with a policy (the usual startup shape).
    pub fn with_policy(policy: Policy) -> Arc<Self> {
        let store = Self::default();
        *store.policy.lock() = Some(policy);
        Arc::new(store)
    }

    /// Flip availability; when unavailable every call errors.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed the stored account catalog.
    pub fn seed_accounts(&self, accounts: Vec<Account>) {
        *self.accounts.lock() = accounts;
    }

    /// What the store currently holds (assertion helper).
    pub fn saved_accounts(&self) -> Vec<Account> {
        self.accounts.lock().clone()
    }

    fn check_available(&self) -> Result<(), PersistError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistError::ReadError { message: "store unavailable".to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load_accounts(&self) -> Result<Vec<Account>, PersistError> {
        self.check_available()?;
        Ok(self.accounts.lock().clone())
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), PersistError> {
        self.check_available()?;
        *self.accounts.lock() = accounts.to_vec();
        Ok(())
    }

    async fn load_policy(&self) -> Result<Policy, PersistError> {
        self.check_available()?;
        self.policy
            .lock()
            .clone()
            .ok_or_else(|| PersistError::NotFound { path: "policy".to_string() })
    }

    async fn save_policy(&self, policy: &Policy) -> Result<(), PersistError> {
        self.check_available()?;
        *self.policy.lock() = Some(policy.clone());
        Ok(())
    }
}
