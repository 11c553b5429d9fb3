//! Worker pool draining a bounded queue with dedicated OS threads.
//!
//! The pool owns one [`BoundedQueue`] of tasks and a fixed set of named
//! worker threads that loop on [`BoundedQueue::take`]. The queue's capacity
//! is the single knob controlling memory and concurrency pressure:
//! [`WorkerPool::submit`] blocks the producer when the queue is full (true
//! backpressure), while [`WorkerPool::try_submit`] is the non-blocking
//! escape hatch for callers unwilling to stall.
//!
//! Shutdown is cooperative: [`WorkerPool::shutdown`] stops intake and wakes
//! every blocked worker, but tasks already enqueued still run, and a worker
//! mid-task always finishes it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::core::cancel::CancelToken;
use crate::core::error::PoolError;
use crate::core::queue::{BoundedQueue, PutError, TakeError};

/// An opaque unit of work: runs once, returns no value, may fail.
///
/// A returned error is logged inside the worker and swallowed; so is a
/// panic. Neither ends the worker or affects other tasks.
pub type Task = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A fixed-size pool of worker threads fed by a [`BoundedQueue`].
///
/// # Examples
///
/// ```
/// use bounded_pool::{PoolConfig, WorkerPool};
///
/// let pool = WorkerPool::new(
///     PoolConfig::new().with_workers(4).with_queue_capacity(16),
/// ).unwrap();
///
/// pool.submit(|| {
///     // runs on one of the four workers
///     Ok(())
/// }).unwrap();
///
/// pool.shutdown();
/// pool.join();
/// ```
pub struct WorkerPool {
    config: PoolConfig,
    queue: Arc<BoundedQueue<Task>>,
    /// Monotonic: set once by the first `shutdown` (or drop), never reset.
    shutting_down: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool and start its worker threads immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] when the configuration fails
    /// validation and [`PoolError::Spawn`] when a worker thread cannot be
    /// created.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let queue = Arc::new(
            BoundedQueue::new(config.queue_capacity)
                .map_err(|e| PoolError::InvalidConfig(e.to_string()))?,
        );
        let shutting_down = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let spawned = spawn_worker(
                worker_id,
                &config,
                Arc::clone(&queue),
                Arc::clone(&shutting_down),
            );
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Workers spawned before the failure are parked in
                    // `take`; closing the queue lets them exit instead of
                    // leaking as permanently blocked threads.
                    queue.close();
                    return Err(err);
                }
            }
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            config,
            queue,
            shutting_down,
            workers: Mutex::new(workers),
        })
    }

    /// Submit a task, blocking while the queue is full.
    ///
    /// The block is the backpressure mechanism: a producer cannot get more
    /// than `queue_capacity` tasks ahead of the workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShuttingDown`] once [`shutdown`](Self::shutdown)
    /// has been called, including for submitters already blocked at that
    /// moment.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.submit_with(task, &CancelToken::new())
    }

    /// Submit a task with a cancellable wait.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit), plus [`PoolError::Cancelled`] when
    /// `cancel` trips while the submitter is blocked on a full queue; the
    /// task has not been enqueued in that case.
    pub fn submit_with<F>(&self, task: F, cancel: &CancelToken) -> Result<(), PoolError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if self.is_shutting_down() {
            return Err(PoolError::ShuttingDown);
        }
        match self.queue.put(Box::new(task) as Task, cancel) {
            Ok(()) => Ok(()),
            Err(PutError::Closed(_)) => Err(PoolError::ShuttingDown),
            Err(PutError::Cancelled(_)) => Err(PoolError::Cancelled),
        }
    }

    /// Submit a task without ever blocking the caller.
    ///
    /// Returns `false` immediately when the pool is shutting down or the
    /// queue is currently full; the task is dropped unexecuted.
    pub fn try_submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if self.is_shutting_down() {
            return false;
        }
        self.queue.try_put(Box::new(task) as Task).is_ok()
    }

    /// Begin a graceful shutdown. Idempotent.
    ///
    /// No new task is accepted afterwards, but everything already enqueued
    /// is still executed. Workers blocked waiting for work are woken so
    /// they can drain the queue and exit; none is forcibly terminated.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(queued = self.queue.len(), "shutting down worker pool");
        // Closing the queue wakes every blocked worker and submitter.
        self.queue.close();
    }

    /// Block until every worker thread has exited its loop.
    ///
    /// Safe to call from several threads: the handle lock is held for the
    /// duration of the joins, so every caller returns only once the last
    /// worker is gone.
    ///
    /// Does not itself trigger shutdown: without a prior
    /// [`shutdown`](Self::shutdown) call this waits for as long as the
    /// workers keep running.
    pub fn join(&self) {
        let mut handles = self.workers.lock();
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                // Workers catch task panics themselves, so this is a bug.
                error!("worker thread panicked outside task execution");
            }
        }
    }

    /// Number of worker threads the pool was configured with.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.config.workers
    }

    /// Number of tasks currently waiting in the queue. Snapshot only.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Capacity of the task queue.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Stop intake and wake the workers, but do not join here: workers
        // drain the queue and exit on their own as detached threads.
        if !self.shutting_down.swap(true, Ordering::AcqRel) {
            self.queue.close();
            debug!("worker pool dropped without explicit shutdown; workers drain detached");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.config.workers)
            .field("queued", &self.queue.len())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

fn spawn_worker(
    worker_id: usize,
    config: &PoolConfig,
    queue: Arc<BoundedQueue<Task>>,
    shutting_down: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, PoolError> {
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id, "worker started");
            let cancel = CancelToken::new();
            loop {
                let task = match queue.take(&cancel) {
                    Ok(task) => task,
                    // Closed is only reported once the queue is also empty,
                    // so this exit implies the drain is complete.
                    Err(TakeError::Closed) => break,
                    Err(TakeError::Cancelled) => {
                        // A cancelled wait alone is not a reason to die:
                        // exit only when shutdown is in progress and there
                        // is nothing left to drain.
                        if shutting_down.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                        continue;
                    }
                };
                run_task(worker_id, task);
            }
            debug!(worker_id, "worker exiting");
        })
        .map_err(PoolError::Spawn)
}

/// Execute one task, confining any failure to this call.
fn run_task(worker_id: usize, task: Task) {
    match panic::catch_unwind(AssertUnwindSafe(move || task())) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(worker_id, error = %err, "task failed"),
        Err(payload) => error!(
            worker_id,
            panic = panic_message(payload.as_ref()),
            "task panicked"
        ),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}
