//! Core queue and pool primitives.

pub mod cancel;
pub mod error;
pub mod pool;
pub mod queue;

pub use cancel::CancelToken;
pub use error::{PoolError, QueueError};
pub use pool::{Task, WorkerPool};
pub use queue::{BoundedQueue, PutError, TakeError, TryPutError};
