//! Error types for ZQLZ

use thiserror::Error;

/// Core error type for ZQLZ operations
#[derive(Error, Debug)]
pub enum ZqlzError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Topology probe error: {0}")]
    TopologyProbe(String),

    #[error("Too many reconnection attempts ({attempts}/{max_attempts})")]
    AttemptsExhausted { attempts: u32, max_attempts: u32 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl ZqlzError {
    /// Whether this error means the physical connection is unusable.
    ///
    /// Only these errors are routed to failover handling; everything else is
    /// returned to the caller as-is.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ZqlzError::Connection(_) | ZqlzError::Io(_) | ZqlzError::Timeout(_)
        )
    }

    /// Whether the logical connection must be discarded after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ZqlzError::AttemptsExhausted { .. })
    }

}

/// Result type alias for ZQLZ operations
pub type Result<T> = std::result::Result<T, ZqlzError>;
