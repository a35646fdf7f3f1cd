//! Error types for poller and lease operations.

use std::sync::Arc;

use thiserror::Error;

/// Errors produced while building or driving a poller.
#[derive(Debug, Error)]
pub enum PollerError {
    /// A leader poller was configured without a key-value store.
    #[error("missing key-value store")]
    MissingStore,
    /// Configuration values were rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The shared store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors produced by key-value store back-ends.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The back-end could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The back-end rejected or failed a command.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Application-facing result using anyhow for user-supplied closures.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// A failure shared between every subscriber that receives it.
pub type SharedError = Arc<anyhow::Error>;
