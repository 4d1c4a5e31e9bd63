//! Typed error definitions for Gempool.
//!
//! This module provides a structured error hierarchy with specific error
//! types for different domains. All errors are designed to be:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants
//! - **Composable** via thiserror derive macros

mod account;
mod orchestrator;
mod persist;
mod proxy;

pub use account::AccountError;
pub use orchestrator::OrchestratorError;
pub use persist::PersistError;
pub use proxy::ProxyError;
