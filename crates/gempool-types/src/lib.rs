//! # Gempool Types
//!
//! Core types, models, and error definitions for the Gempool orchestrator.
//!
//! This crate provides the foundational type system for the Gempool workspace:
//!
//! - **`error`** - Typed error hierarchy for the dispatch path, accounts,
//!   proxies, and persistence
//! - **`models`** - Domain models (Account, Proxy, Policy, ExecutionOutcome)
//!
//! `gempool-types` sits at the bottom of the dependency graph; everything
//! here is serializable via serde, `Clone` for cheap sharing across async
//! boundaries, and `PartialEq` for testing.

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{AccountError, OrchestratorError, PersistError, ProxyError};

// Re-export core model types
pub use models::{
    Account, AccountStatus, AccountView, AutoRegisterPolicy, Credential, ExecutionOutcome,
    OrchestratorEvent, OutcomeKind, Policy, Proxy, ProxyEndpoint, ProxyLiveness, RebindStrategy,
};
