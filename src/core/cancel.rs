//! Cooperative cancellation for blocking queue waits.
//!
//! Threads have no safe external interruption mechanism, so a blocked
//! [`put`](crate::BoundedQueue::put) or [`take`](crate::BoundedQueue::take)
//! is cancelled cooperatively instead: the waiter passes a [`CancelToken`],
//! and tripping the token wakes the waiter so it can return a `Cancelled`
//! result without touching queue state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Wakes the threads blocked inside a queue so they can re-check their
/// wait condition and observe a tripped token.
pub(crate) trait WakeWaiters: Send + Sync {
    /// Wake every waiter. Must be safe to call more than once and must
    /// synchronize with waiters that are about to park.
    fn wake_all(&self);
}

#[derive(Default)]
struct TokenShared {
    cancelled: AtomicBool,
    /// Queues with waiters that asked to be woken when this token trips.
    watchers: Mutex<Vec<Weak<dyn WakeWaiters>>>,
}

/// A cloneable cancellation handle for blocking queue operations.
///
/// All clones share one flag; cancellation is monotonic and idempotent.
/// A cancelled wait fails with a `Cancelled` result and leaves the queue
/// exactly as it was — the in-flight item is handed back to the caller.
///
/// # Examples
///
/// ```
/// use bounded_pool::{BoundedQueue, CancelToken, TakeError};
/// use std::thread;
/// use std::time::Duration;
///
/// let queue = BoundedQueue::<u64>::new(1).unwrap();
/// let cancel = CancelToken::new();
///
/// let canceller = cancel.clone();
/// thread::spawn(move || {
///     thread::sleep(Duration::from_millis(20));
///     canceller.cancel();
/// });
///
/// // Nothing is ever put, so the take ends with the cancellation.
/// assert_eq!(queue.take(&cancel), Err(TakeError::Cancelled));
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    shared: Arc<TokenShared>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Trip the token and wake every registered waiter.
    ///
    /// Only the first call does any work; the flag never resets.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Release the registry lock before waking: wake_all takes the
        // queue lock, and waiters register while holding it.
        let watchers = std::mem::take(&mut *self.shared.watchers.lock());
        for watcher in watchers {
            if let Some(watcher) = watcher.upgrade() {
                watcher.wake_all();
            }
        }
    }

    /// Ask for `target` to be woken when the token trips.
    ///
    /// Callers must re-check [`is_cancelled`](Self::is_cancelled) after
    /// registering and before parking; a cancel that has already drained
    /// the registry will not see this entry.
    pub(crate) fn watch(&self, target: &Weak<dyn WakeWaiters>) {
        let mut watchers = self.shared.watchers.lock();
        watchers.retain(|w| w.strong_count() > 0);
        if !watchers.iter().any(|w| w.ptr_eq(target)) {
            watchers.push(Weak::clone(target));
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
