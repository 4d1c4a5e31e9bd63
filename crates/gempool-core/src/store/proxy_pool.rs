//! Proxy pool: liveness tracking and round-robin selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use gempool_types::models::{Proxy, ProxyEndpoint, ProxyLiveness};

/// Catalog of named egress endpoints with liveness state.
///
/// The orchestrator consumes liveness; it does not manage the egress
/// engine's process lifecycle. A proxy marked Down stays out of selection
/// until the health loop probes it back Up.
#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: DashMap<String, Proxy>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    /// Build a pool from configured endpoints; everything starts Up and the
    /// first probe cycle corrects optimism.
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        let pool = Self { proxies: DashMap::new(), cursor: AtomicUsize::new(0) };
        for endpoint in endpoints {
            pool.proxies.insert(endpoint.name.clone(), Proxy::new(endpoint));
        }
        pool
    }

    /// Replace the configured endpoints. Surviving names keep their liveness
    /// and probe bookkeeping; removed names drop out of rotation.
    pub fn reload(&self, endpoints: Vec<ProxyEndpoint>) {
        let incoming: std::collections::HashSet<&str> =
            endpoints.iter().map(|e| e.name.as_str()).collect();

        let stale: Vec<String> = self
            .proxies
            .iter()
            .filter(|entry| !incoming.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();
        for name in stale {
            self.proxies.remove(&name);
        }

        for endpoint in endpoints {
            match self.proxies.get_mut(&endpoint.name) {
                Some(mut existing) => existing.url = endpoint.url,
                None => {
                    self.proxies.insert(endpoint.name.clone(), Proxy::new(endpoint));
                }
            }
        }
        tracing::info!("proxy pool reloaded: {} endpoint(s)", self.proxies.len());
    }

    /// All proxies, point-in-time copy.
    pub fn list(&self) -> Vec<Proxy> {
        self.proxies.iter().map(|entry| entry.value().clone()).collect()
    }

    /// The Up subset.
    pub fn list_up(&self) -> Vec<Proxy> {
        self.proxies.iter().filter(|e| e.value().is_up()).map(|e| e.value().clone()).collect()
    }

    /// Names of Down proxies (probe worklist).
    pub fn down_names(&self) -> Vec<String> {
        self.proxies.iter().filter(|e| !e.value().is_up()).map(|e| e.key().clone()).collect()
    }

    /// Round-robin pick over the Up subset.
    ///
    /// The cursor advances on every call regardless of what the caller does
    /// with the pick, so one slow proxy cannot starve the others.
    pub fn next_up(&self) -> Option<Proxy> {
        let mut up = self.list_up();
        if up.is_empty() {
            return None;
        }
        // Stable order so the cursor walks the same ring every pass.
        up.sort_by(|a, b| a.name.cmp(&b.name));
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % up.len();
        Some(up[idx].clone())
    }

    /// Whether any endpoints are configured at all (empty pool = direct egress).
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether the named proxy exists and is Up.
    pub fn is_up(&self, name: &str) -> bool {
        self.proxies.get(name).is_some_and(|entry| entry.is_up())
    }

    /// Resolve a name to its egress URL.
    pub fn url_of(&self, name: &str) -> Option<String> {
        self.proxies.get(name).map(|entry| entry.url.clone())
    }

    /// Demote a proxy immediately (fail-fast on NetworkError).
    pub fn mark_down(&self, name: &str) {
        if let Some(mut entry) = self.proxies.get_mut(name) {
            if entry.is_up() {
                tracing::warn!("proxy {} marked down", name);
            }
            entry.liveness = ProxyLiveness::Down;
            entry.consecutive_probe_failures = entry.consecutive_probe_failures.saturating_add(1);
            entry.last_checked = Some(chrono::Utc::now().timestamp_millis());
        }
    }

    /// Promote a proxy after a successful probe. Only the health loop calls
    /// this.
    pub fn mark_up(&self, name: &str) {
        if let Some(mut entry) = self.proxies.get_mut(name) {
            if !entry.is_up() {
                tracing::info!("proxy {} back up", name);
            }
            entry.liveness = ProxyLiveness::Up;
            entry.consecutive_probe_failures = 0;
            entry.last_checked = Some(chrono::Utc::now().timestamp_millis());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(names: &[&str]) -> Vec<ProxyEndpoint> {
        names
            .iter()
            .map(|n| ProxyEndpoint { name: (*n).to_string(), url: format!("socks5://{n}:1080") })
            .collect()
    }

    #[test]
    fn test_round_robin_cycles_up_subset() {
        let pool = ProxyPool::new(endpoints(&["a", "b", "c"]));

        let picks: Vec<String> =
            (0..6).filter_map(|_| pool.next_up()).map(|p| p.name).collect();
        assert_eq!(picks, ["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_down_proxy_is_skipped_until_marked_up() {
        let pool = ProxyPool::new(endpoints(&["a", "b"]));
        pool.mark_down("a");

        for _ in 0..4 {
            assert_eq!(pool.next_up().map(|p| p.name), Some("b".to_string()));
        }

        pool.mark_up("a");
        let picks: std::collections::HashSet<String> =
            (0..4).filter_map(|_| pool.next_up()).map(|p| p.name).collect();
        assert!(picks.contains("a"));
    }

    #[test]
    fn test_all_down_yields_none() {
        let pool = ProxyPool::new(endpoints(&["a"]));
        pool.mark_down("a");
        assert!(pool.next_up().is_none());
        assert_eq!(pool.down_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_reload_preserves_liveness_of_survivors() {
        let pool = ProxyPool::new(endpoints(&["a", "b"]));
        pool.mark_down("a");

        pool.reload(endpoints(&["a", "c"]));

        assert!(!pool.is_up("a"), "surviving proxy keeps Down state");
        assert!(pool.is_up("c"));
        assert!(pool.url_of("b").is_none(), "removed proxy is gone");
    }
}
