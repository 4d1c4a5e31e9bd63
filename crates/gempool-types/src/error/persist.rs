//! Persistence errors.
//!
//! Persistence unavailable at startup is the one fatal condition in the
//! system: without accounts and a policy there is nothing to serve.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the persistence collaborator (file- or database-backed).
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum PersistError {
    /// Backing store not found at expected location
    #[error("Store not found: {path}")]
    NotFound {
        /// Path or identifier where the store was expected
        path: String,
    },

    /// Stored data failed to parse
    #[error("Parse error: {message}")]
    ParseError {
        /// Description of the parse failure
        message: String,
    },

    /// Write failed (permission denied, disk full, etc)
    #[error("Write error: {message}")]
    WriteError {
        /// Description of the write failure
        message: String,
    },

    /// Read failed
    #[error("Read error: {message}")]
    ReadError {
        /// Description of the read failure
        message: String,
    },

    /// Policy failed validation after load
    #[error("Invalid policy: {message}")]
    InvalidPolicy {
        /// Description of the validation failure
        message: String,
    },
}

impl PersistError {
    /// Create a parse error from a serde_json error.
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: e.to_string() }
    }

    /// Create a write error from an IO error.
    pub fn from_io_error(e: &std::io::Error) -> Self {
        Self::WriteError { message: e.to_string() }
    }
}
