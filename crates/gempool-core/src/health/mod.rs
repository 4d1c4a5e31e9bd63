//! Background health machinery: proxy probing, cooldown recovery,
//! credential refresh, auto-registration.

pub(crate) mod backoff;
mod monitor;
mod probe;

pub use monitor::HealthMonitor;
pub use probe::{HttpProber, ProxyProber};
