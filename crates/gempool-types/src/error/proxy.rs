//! Proxy-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during proxy pool operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProxyError {
    /// Proxy with given name not found in the pool
    #[error("Proxy not found: {name}")]
    NotFound {
        /// Name of the missing proxy
        name: String,
    },

    /// No proxy with liveness Up is available
    #[error("No live proxy available: {reason}")]
    NoneUp {
        /// Explanation of why the Up subset is empty
        reason: String,
    },

    /// Liveness probe failed
    #[error("Probe failed for {name}: {message}")]
    ProbeFailed {
        /// Name of the probed proxy
        name: String,
        /// Description of the probe failure
        message: String,
    },

    /// Proxy endpoint URL is malformed or uses an unsupported scheme
    #[error("Invalid proxy endpoint {name}: {message}")]
    InvalidEndpoint {
        /// Name of the offending proxy
        name: String,
        /// Description of the validation failure
        message: String,
    },
}
