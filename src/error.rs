//! Error types for the Gatekeeper service.

use thiserror::Error;

/// Main error type for Gatekeeper operations.
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The counter store could not be reached or answered with garbage.
    ///
    /// Never surfaced to clients; the admission controller resolves it
    /// through the configured fallback policy.
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// A request cost of zero was declared for an operation.
    #[error("Request cost must be a positive integer, got {0}")]
    InvalidCost(u64),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for GatekeeperError {
    fn from(err: redis::RedisError) -> Self {
        GatekeeperError::StoreUnavailable(err.to_string())
    }
}

/// Result type alias for Gatekeeper operations.
pub type Result<T> = std::result::Result<T, GatekeeperError>;
