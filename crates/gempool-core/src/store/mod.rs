//! Owned state stores.
//!
//! Both stores are mutated only by the Dispatcher and the HealthMonitor,
//! through entry-scoped critical sections (one account's counters, one
//! proxy's liveness), never under a pool-wide lock.

mod account_store;
mod proxy_pool;

pub use account_store::{apply_outcome, AccountStore};
pub use proxy_pool::ProxyPool;
