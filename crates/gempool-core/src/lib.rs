//! # Gempool Core
//!
//! The Account & Proxy Pool Orchestrator: owns account/proxy state, enforces
//! per-account concurrency and rate discipline, performs health probing and
//! automatic recovery, and exposes a single `execute(task) -> result`
//! contract to the request-serving layer.
//!
//! ```text
//! gempool-core/src/
//! ├── orchestrator/     # Dispatcher: selection, admission, outcome policy
//! ├── store/            # AccountStore + ProxyPool (per-entity mutation)
//! ├── health/           # Background monitor: probes, cooldown, refresh
//! ├── settings.rs       # Atomically-swappable policy snapshot
//! ├── executor.rs       # Upstream capability contract
//! ├── persist/          # Load/save contract + JSON file backend
//! ├── events.rs         # Fire-and-forget observability sink
//! └── testkit.rs        # Scripted executor for tests
//! ```
//!
//! The HTTP surface, admin UI, and process bootstrap live outside this crate
//! and talk to [`Orchestrator`] directly.

pub mod events;
pub mod executor;
pub mod health;
pub mod orchestrator;
pub mod persist;
pub mod settings;
pub mod store;
pub mod testkit;

// Re-export commonly used types
pub use events::{EventSink, TracingSink};
pub use executor::{Executor, RegisteredAccount};
pub use health::{HealthMonitor, HttpProber, ProxyProber};
pub use orchestrator::Orchestrator;
pub use persist::{JsonFileStore, Persistence};
pub use settings::SettingsStore;
pub use store::{AccountStore, ProxyPool};
