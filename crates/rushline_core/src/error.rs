//! # Pool Errors
//!
//! Error types for pool operations.

use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Pool operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every slot is live and the pool may not grow further.
    #[error("Pool exhausted: all {max_size} instances are live")]
    Exhausted {
        /// Configured growth limit.
        max_size: usize,
    },

    /// Handle refers to a slot that was released (or never existed).
    #[error("Stale pool handle")]
    StaleHandle,

    /// The construction hook could not produce an instance.
    #[error("Instance construction failed")]
    ConstructionFailed,
}
