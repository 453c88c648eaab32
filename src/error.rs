//! Error types for chargestore
//!
//! Provides a unified error type for all operations.
//!
//! The first block of variants are the sentinel conditions callers branch on
//! (`NotFound`, `NoDatabaseConn`, `NotImplemented`, `NotConvertible`). The
//! connectivity variants are the only ones the connection manager treats as
//! "try the next connection".

use std::time::Duration;

use thiserror::Error;

/// Result type alias using ChargeError
pub type Result<T> = std::result::Result<T, ChargeError>;

/// Unified error type for chargestore operations
#[derive(Debug, Error)]
pub enum ChargeError {
    // -------------------------------------------------------------------------
    // Sentinel Conditions
    // -------------------------------------------------------------------------
    #[error("NOT_FOUND")]
    NotFound,

    #[error("NO_DATABASE_CONNECTION")]
    NoDatabaseConn,

    #[error("NOT_IMPLEMENTED")]
    NotImplemented,

    #[error("NOT_CONVERTIBLE")]
    NotConvertible,

    #[error("INVALID_KEY: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Connectivity Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("No reachable connection among {conn_ids:?}: {reason}")]
    Unreachable {
        conn_ids: Vec<String>,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Remote Errors
    // -------------------------------------------------------------------------
    #[error("SERVER_ERROR: {0}")]
    Server(Box<ChargeError>),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Journal Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChargeError {
    /// Wrap a failed remote read so it is never mistaken for a local miss
    pub fn server(cause: ChargeError) -> Self {
        ChargeError::Server(Box::new(cause))
    }

    /// True for connectivity failures, the only errors that make the
    /// connection manager advance to the next connection id
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChargeError::Transport(_)
                | ChargeError::Timeout(_)
                | ChargeError::Unreachable { .. }
                | ChargeError::Io(_)
                | ChargeError::Protocol(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ChargeError::NotFound)
    }

    /// The innermost cause of a `Server` error (self otherwise)
    pub fn root_cause(&self) -> &ChargeError {
        match self {
            ChargeError::Server(inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl From<bincode::Error> for ChargeError {
    fn from(err: bincode::Error) -> Self {
        ChargeError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChargeError {
    fn from(err: serde_json::Error) -> Self {
        ChargeError::Serialization(err.to_string())
    }
}
