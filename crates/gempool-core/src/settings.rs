//! Atomically-swappable policy snapshot.

use std::sync::Arc;

use gempool_types::models::Policy;
use parking_lot::RwLock;

/// Holds the currently active [`Policy`].
///
/// `current()` hands out the whole snapshot as an `Arc`; a reload swaps the
/// reference in one motion, so an operation that captured a snapshot keeps
/// observing the old values for its entire duration and no reader ever sees
/// a half-applied policy.
#[derive(Debug)]
pub struct SettingsStore {
    snapshot: RwLock<Arc<Policy>>,
}

impl SettingsStore {
    /// Create a store with the given initial policy.
    pub fn new(policy: Policy) -> Self {
        Self { snapshot: RwLock::new(Arc::new(policy)) }
    }

    /// Get the current policy snapshot.
    pub fn current(&self) -> Arc<Policy> {
        Arc::clone(&self.snapshot.read())
    }

    /// Swap in a new policy. In-flight operations finish under the snapshot
    /// they already hold.
    pub fn reload(&self, policy: Policy) {
        let mut guard = self.snapshot.write();
        *guard = Arc::new(policy);
        tracing::info!("policy reloaded");
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_reload() {
        let store = SettingsStore::new(Policy { cooldown_seconds: 5, ..Policy::default() });

        let before = store.current();
        store.reload(Policy { cooldown_seconds: 60, ..Policy::default() });

        // The captured snapshot still carries the old value; fresh reads see
        // the new one.
        assert_eq!(before.cooldown_seconds, 5);
        assert_eq!(store.current().cooldown_seconds, 60);
    }
}
