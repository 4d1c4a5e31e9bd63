//! RAII admission slots: per-account and global concurrency tickets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Shared slot counters for the whole pool.
///
/// One per-account counter plus one global counter. Acquisition is
/// non-blocking CAS; the fixed account-then-global order plus unconditional
/// release on Drop keeps the scheme deadlock-free.
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    per_account: Arc<DashMap<String, AtomicU32>>,
    global: Arc<AtomicU32>,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current in-flight count for an account (selection uses this to skip
    /// saturated accounts without blocking).
    pub(crate) fn active_for(&self, account_id: &str) -> u32 {
        self.per_account.get(account_id).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }
}

/// Ephemeral concurrency ticket held for the duration of one Executor
/// invocation. Decrements both counters on drop; never persisted.
pub(crate) struct AdmissionGuard {
    per_account: Arc<DashMap<String, AtomicU32>>,
    global: Arc<AtomicU32>,
    key: String,
}

impl AdmissionGuard {
    /// Atomically reserve an account slot then a global slot.
    ///
    /// Returns `None` without side effects if either cap would be exceeded
    /// (the account reservation is rolled back when the global cap is the
    /// one that fails).
    pub(crate) fn try_acquire(
        table: &SlotTable,
        account_id: &str,
        per_account_cap: u32,
        global_cap: u32,
    ) -> Option<Self> {
        let per_account = Arc::clone(&table.per_account);
        let global = Arc::clone(&table.global);

        per_account.entry(account_id.to_string()).or_insert_with(|| AtomicU32::new(0));
        let counter_ref = per_account.get(account_id)?;
        loop {
            let current = counter_ref.load(Ordering::SeqCst);
            if current >= per_account_cap {
                return None;
            }
            if counter_ref
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }
        drop(counter_ref);

        loop {
            let current = global.load(Ordering::SeqCst);
            if current >= global_cap {
                // Roll back the account reservation.
                release_one(&per_account, account_id);
                return None;
            }
            if global
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Some(Self { per_account, global, key: account_id.to_string() });
            }
        }
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        release_one(&self.per_account, &self.key);
        let _ = self.global.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            if v > 0 {
                Some(v - 1)
            } else {
                None
            }
        });
    }
}

fn release_one(per_account: &DashMap<String, AtomicU32>, key: &str) {
    if let Some(counter) = per_account.get(key) {
        let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            if v > 0 {
                Some(v - 1)
            } else {
                None
            }
        });
    }
}
