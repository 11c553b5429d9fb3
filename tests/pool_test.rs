//! Integration tests for `WorkerPool`.
//!
//! These tests validate real-world functionality including:
//! - Bounded parallelism and backpressure on blocking submission
//! - Non-blocking submission on a full queue
//! - Graceful shutdown with drain and rejection of late work
//! - Failure isolation for tasks that error or panic
//! - Cancellation of a blocked submitter

use bounded_pool::{CancelToken, PoolConfig, PoolError, WorkerPool};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const LONG_WAIT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(150);

fn pool(workers: usize, queue_capacity: usize) -> WorkerPool {
    bounded_pool::util::init_tracing();
    WorkerPool::new(
        PoolConfig::new()
            .with_workers(workers)
            .with_queue_capacity(queue_capacity),
    )
    .unwrap()
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Occupies every worker of a pool until the returned sender is dropped or
/// sends one unit per worker.
fn gate_workers(pool: &WorkerPool, workers: usize) -> mpsc::Sender<()> {
    let (tx, rx) = mpsc::channel::<()>();
    let rx = Arc::new(Mutex::new(rx));
    let started = Arc::new(AtomicUsize::new(0));
    for _ in 0..workers {
        let rx = Arc::clone(&rx);
        let started = Arc::clone(&started);
        pool.submit(move || {
            started.fetch_add(1, Ordering::SeqCst);
            let _ = rx.lock().recv();
            Ok(())
        })
        .unwrap();
    }
    // Wait until every worker is actually parked inside its gate task.
    assert!(wait_until(LONG_WAIT, || {
        started.load(Ordering::SeqCst) == workers
    }));
    tx
}

// ============================================================================
// EXECUTION AND BACKPRESSURE
// ============================================================================

/// 2 workers, queue capacity 2, five 100ms tasks. Total
/// wall-clock time is about ceil(5/2) x 100ms, and no more than two tasks
/// ever run at once.
#[test]
fn test_bounded_parallelism_and_backpressure() {
    let pool = pool(2, 2);

    let concurrent = Arc::new(AtomicU64::new(0));
    let max_concurrent = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    for _ in 0..5 {
        let concurrent = Arc::clone(&concurrent);
        let max_concurrent = Arc::clone(&max_concurrent);
        pool.submit(move || {
            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            max_concurrent.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }
    pool.shutdown();
    pool.join();
    let elapsed = start.elapsed();

    assert!(max_concurrent.load(Ordering::SeqCst) <= 2);
    // Three serialized waves of 100ms; generous upper bound for slow CI.
    assert!(elapsed >= Duration::from_millis(280), "finished too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "finished too slow: {elapsed:?}");
}

#[test]
fn test_blocking_submit_applies_backpressure() {
    let pool = Arc::new(pool(1, 1));
    let gate = gate_workers(&pool, 1);

    // Fill the single queue slot; the next submit must block.
    pool.submit(|| Ok(())).unwrap();
    assert_eq!(pool.queued(), 1);

    let unblocked = Arc::new(AtomicUsize::new(0));
    let submitter = {
        let pool = Arc::clone(&pool);
        let unblocked = Arc::clone(&unblocked);
        thread::spawn(move || {
            pool.submit(|| Ok(())).unwrap();
            unblocked.fetch_add(1, Ordering::SeqCst);
        })
    };

    thread::sleep(SETTLE);
    assert_eq!(unblocked.load(Ordering::SeqCst), 0, "submit did not block");

    // Releasing the worker drains a slot and unblocks the submitter.
    gate.send(()).unwrap();
    assert!(wait_until(LONG_WAIT, || unblocked.load(Ordering::SeqCst) == 1));
    submitter.join().unwrap();

    pool.shutdown();
    pool.join();
}

// ============================================================================
// NON-BLOCKING SUBMISSION
// ============================================================================

/// `try_submit` on a full capacity-1 queue with no idle
/// worker returns false immediately; once a slot drains it returns true.
#[test]
fn test_try_submit_full_then_available() {
    let pool = pool(1, 1);
    let gate = gate_workers(&pool, 1);

    let executed = Arc::new(AtomicUsize::new(0));

    // Occupy the single queue slot.
    let e = Arc::clone(&executed);
    assert!(pool.try_submit(move || {
        e.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    // Full queue, busy worker: immediate rejection, bounded latency.
    let start = Instant::now();
    assert!(!pool.try_submit(|| Ok(())));
    assert!(start.elapsed() < Duration::from_millis(250), "try_submit blocked");

    // Let the worker drain the queued task, then a slot is available again.
    gate.send(()).unwrap();
    assert!(wait_until(LONG_WAIT, || pool.queued() == 0));

    let e = Arc::clone(&executed);
    assert!(pool.try_submit(move || {
        e.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    pool.shutdown();
    pool.join();
    assert_eq!(executed.load(Ordering::SeqCst), 2);
}

// ============================================================================
// SHUTDOWN AND DRAIN
// ============================================================================

/// Shutdown with queued work pending: every enqueued task
/// runs exactly once, join returns only afterwards, and late submissions
/// are rejected.
#[test]
fn test_shutdown_drains_queued_tasks() {
    let pool = pool(1, 8);
    let gate = gate_workers(&pool, 1);

    let executed = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let executed = Arc::clone(&executed);
        pool.submit(move || {
            executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    }
    assert_eq!(pool.queued(), 4);

    pool.shutdown();

    // No intake after shutdown, on either submission path.
    assert!(matches!(
        pool.submit(|| Ok(())),
        Err(PoolError::ShuttingDown)
    ));
    assert!(!pool.try_submit(|| Ok(())));

    // The worker is still gated; nothing has drained yet.
    assert_eq!(executed.load(Ordering::SeqCst), 0);

    gate.send(()).unwrap();
    pool.join();
    assert_eq!(executed.load(Ordering::SeqCst), 4, "drain lost tasks");
    assert_eq!(pool.queued(), 0);
}

#[test]
fn test_blocked_submitter_wakes_on_shutdown() {
    let pool = Arc::new(pool(1, 1));
    let gate = gate_workers(&pool, 1);
    pool.submit(|| Ok(())).unwrap();

    let submitter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(|| Ok(())))
    };

    thread::sleep(SETTLE);
    pool.shutdown();

    // The parked submitter observes the shutdown instead of hanging.
    assert!(matches!(
        submitter.join().unwrap(),
        Err(PoolError::ShuttingDown)
    ));

    gate.send(()).unwrap();
    pool.join();
}

#[test]
fn test_join_returns_only_after_workers_exit() {
    let pool = Arc::new(pool(2, 4));
    let gate = gate_workers(&pool, 2);

    pool.shutdown();

    let joined = Arc::new(AtomicUsize::new(0));
    let joiner = {
        let pool = Arc::clone(&pool);
        let joined = Arc::clone(&joined);
        thread::spawn(move || {
            pool.join();
            joined.fetch_add(1, Ordering::SeqCst);
        })
    };

    // Workers are still gated inside tasks, so join must still be waiting.
    thread::sleep(SETTLE);
    assert_eq!(joined.load(Ordering::SeqCst), 0, "join returned early");

    gate.send(()).unwrap();
    gate.send(()).unwrap();
    assert!(wait_until(LONG_WAIT, || joined.load(Ordering::SeqCst) == 1));
    joiner.join().unwrap();
}

/// Two threads calling `join()` at once: neither may return while a worker
/// is still running, even though only one of them drains the handles.
#[test]
fn test_concurrent_joins_both_wait_for_workers() {
    let pool = Arc::new(pool(1, 2));
    let gate = gate_workers(&pool, 1);
    pool.shutdown();

    let joined = Arc::new(AtomicUsize::new(0));
    let joiners: Vec<_> = (0..2)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let joined = Arc::clone(&joined);
            thread::spawn(move || {
                pool.join();
                joined.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    // The worker is still gated inside its task; both joins must be parked,
    // one on the worker's handle and the other on the handle lock.
    thread::sleep(SETTLE);
    assert_eq!(
        joined.load(Ordering::SeqCst),
        0,
        "a join returned while the worker was still running"
    );

    gate.send(()).unwrap();
    assert!(wait_until(LONG_WAIT, || joined.load(Ordering::SeqCst) == 2));
    for joiner in joiners {
        joiner.join().unwrap();
    }
}

// ============================================================================
// FAILURE ISOLATION
// ============================================================================

/// A task that fails (or panics) is swallowed and the same
/// worker proceeds to the next queued task.
#[test]
fn test_task_failures_are_confined_to_the_task() {
    let pool = pool(1, 8);
    let executed = Arc::new(AtomicUsize::new(0));

    pool.submit(|| Err(anyhow::anyhow!("deliberate failure"))).unwrap();
    pool.submit(|| panic!("deliberate panic")).unwrap();
    let e = Arc::clone(&executed);
    pool.submit(move || {
        e.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    pool.shutdown();
    pool.join();

    // The single worker survived both failures to run the last task.
    assert_eq!(executed.load(Ordering::SeqCst), 1);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_cancelling_blocked_submission() {
    let pool = Arc::new(pool(1, 1));
    let gate = gate_workers(&pool, 1);
    pool.submit(|| Ok(())).unwrap();

    let cancel = CancelToken::new();
    let submitter = {
        let pool = Arc::clone(&pool);
        let cancel = cancel.clone();
        thread::spawn(move || pool.submit_with(|| Ok(()), &cancel))
    };

    thread::sleep(SETTLE);
    cancel.cancel();

    assert!(matches!(
        submitter.join().unwrap(),
        Err(PoolError::Cancelled)
    ));
    // The cancelled task never made it into the queue.
    assert_eq!(pool.queued(), 1);

    gate.send(()).unwrap();
    pool.shutdown();
    pool.join();
}
