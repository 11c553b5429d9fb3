//! # Bounded Pool
//!
//! A fixed-capacity blocking queue and the backpressure-aware worker thread
//! pool that consumes it.
//!
//! This library provides two components, in dependency order:
//!
//! - [`BoundedQueue`]: a fixed-capacity FIFO hand-off between producers and
//!   consumers, safe under concurrent access from both sides. Blocking
//!   inserts and removals wait on two condition variables sharing a single
//!   lock; waits are cancellable and the queue can be closed for a graceful
//!   drain.
//! - [`WorkerPool`]: a fixed set of dedicated OS worker threads draining one
//!   `BoundedQueue` of tasks. Submission is blocking (true backpressure) or
//!   non-blocking, and shutdown stops intake while letting workers finish
//!   everything already enqueued.
//!
//! ## Core Problem Solved
//!
//! An unbounded task queue lets producers get arbitrarily far ahead of
//! consumers, turning load spikes into unbounded memory growth. Bounding the
//! queue and *blocking* the producer when it is full propagates the overload
//! signal upstream instead of hiding it:
//!
//! - **Backpressure**: a producer cannot outrun the workers by more than
//!   `queue_capacity` items
//! - **Bounded parallelism**: at most `workers` tasks execute at once
//! - **Graceful shutdown**: after [`WorkerPool::shutdown`] no new work is
//!   accepted, but every task already enqueued still runs exactly once
//! - **Failure isolation**: a task that fails or panics is reported and
//!   swallowed inside the worker; it never takes the worker down
//!
//! ## Example
//!
//! ```
//! use bounded_pool::{PoolConfig, WorkerPool};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = WorkerPool::new(
//!     PoolConfig::new().with_workers(2).with_queue_capacity(8),
//! ).unwrap();
//!
//! let done = Arc::new(AtomicUsize::new(0));
//! for _ in 0..5 {
//!     let done = Arc::clone(&done);
//!     pool.submit(move || {
//!         done.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }).unwrap();
//! }
//!
//! pool.shutdown();
//! pool.join();
//! assert_eq!(done.load(Ordering::SeqCst), 5);
//! ```
//!
//! ## Using the queue directly
//!
//! ```
//! use bounded_pool::{BoundedQueue, CancelToken};
//!
//! let queue = BoundedQueue::new(3).unwrap();
//! let cancel = CancelToken::new();
//!
//! queue.put("a", &cancel).unwrap();
//! queue.put("b", &cancel).unwrap();
//! assert_eq!(queue.len(), 2);
//! assert_eq!(queue.take(&cancel).unwrap(), "a");
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core queue and pool types.
pub mod core;
/// Configuration models for the worker pool.
pub mod config;
/// Shared utilities.
pub mod util;

pub use crate::config::PoolConfig;
pub use crate::core::{
    BoundedQueue, CancelToken, PoolError, PutError, QueueError, Task, TakeError, TryPutError,
    WorkerPool,
};
