//! Proxy liveness probing.

use std::time::Duration;

use async_trait::async_trait;
use gempool_types::error::ProxyError;
use gempool_types::models::Proxy;

const PROBE_TIMEOUT_SECS: u64 = 10;
const PROBE_URL: &str = "https://www.gstatic.com/generate_204";

/// Lightweight liveness check through an egress endpoint.
#[async_trait]
pub trait ProxyProber: Send + Sync {
    /// Returns Ok if the proxy can reach the probe target.
    async fn probe(&self, proxy: &Proxy) -> Result<(), ProxyError>;
}

/// Default prober: a no-body GET through the proxy against a 204 endpoint.
#[derive(Debug, Clone)]
pub struct HttpProber {
    probe_url: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(probe_url: impl Into<String>, timeout: Duration) -> Self {
        Self { probe_url: probe_url.into(), timeout }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(PROBE_URL, Duration::from_secs(PROBE_TIMEOUT_SECS))
    }
}

#[async_trait]
impl ProxyProber for HttpProber {
    async fn probe(&self, proxy: &Proxy) -> Result<(), ProxyError> {
        let upstream = reqwest::Proxy::all(&proxy.url).map_err(|e| {
            ProxyError::InvalidEndpoint { name: proxy.name.clone(), message: e.to_string() }
        })?;

        let client = reqwest::Client::builder()
            .proxy(upstream)
            .timeout(self.timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ProxyError::ProbeFailed {
                name: proxy.name.clone(),
                message: format!("failed to build probe client: {e}"),
            })?;

        let response = client.get(&self.probe_url).send().await.map_err(|e| {
            ProxyError::ProbeFailed { name: proxy.name.clone(), message: e.to_string() }
        })?;

        if !response.status().is_success() {
            return Err(ProxyError::ProbeFailed {
                name: proxy.name.clone(),
                message: format!("probe returned HTTP {}", response.status()),
            });
        }

        Ok(())
    }
}
