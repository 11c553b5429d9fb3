//! Error types for queue construction and pool operations.
//!
//! The blocking queue operations have their own item-carrying error types,
//! colocated with [`BoundedQueue`](crate::BoundedQueue) in `core::queue`.

use thiserror::Error;

/// Errors produced when constructing a [`BoundedQueue`](crate::BoundedQueue).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// A capacity of zero cannot hold any item.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,
}

/// Errors produced by [`WorkerPool`](crate::WorkerPool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has begun shutting down and accepts no new work.
    #[error("pool is shutting down")]
    ShuttingDown,

    /// The submitting thread's wait was cancelled before queue space opened up.
    #[error("submission cancelled before queue space became available")]
    Cancelled,

    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}
