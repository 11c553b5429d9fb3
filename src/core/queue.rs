//! Fixed-capacity blocking FIFO queue.
//!
//! [`BoundedQueue`] hands items from producers to consumers through a
//! circular buffer guarded by one [`parking_lot::Mutex`] and two condition
//! variables: `not_full` (signalled by every successful removal) and
//! `not_empty` (signalled by every successful insertion). A single condvar
//! would risk lost wake-ups when producers and consumers wait at the same
//! time, so the two-condition shape is load-bearing, not a tuning choice.
//!
//! Every waiter re-checks its condition in a loop after waking; wake-ups
//! may be spurious or meant for a thread with a different condition.
//!
//! Blocking operations are cancellable through a [`CancelToken`], and the
//! queue can be [`close`](BoundedQueue::close)d: putters then fail fast
//! while takers drain whatever is left before observing `Closed`. Both
//! paths leave `head`/`tail`/`count` untouched and hand the in-flight item
//! back to the caller, so no item is ever lost or duplicated.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::core::cancel::{CancelToken, WakeWaiters};
use crate::core::error::QueueError;

/// Error returned by [`BoundedQueue::put`]. Carries the rejected item so
/// the caller can retry or abandon without losing it.
pub enum PutError<T> {
    /// The queue was closed before the item could be inserted.
    Closed(T),
    /// The wait was cancelled before space became available.
    Cancelled(T),
}

impl<T> PutError<T> {
    /// Recover the item that could not be inserted.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Closed(item) | Self::Cancelled(item) => item,
        }
    }
}

// Manual impls so the error works for item types that are not Debug,
// mirroring std::sync::mpsc::SendError.
impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(_) => f.write_str("Closed(..)"),
            Self::Cancelled(_) => f.write_str("Cancelled(..)"),
        }
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(_) => f.write_str("queue is closed"),
            Self::Cancelled(_) => f.write_str("wait cancelled before space became available"),
        }
    }
}

impl<T> std::error::Error for PutError<T> {}

/// Error returned by [`BoundedQueue::try_put`]. Carries the rejected item.
pub enum TryPutError<T> {
    /// The queue is at capacity right now.
    Full(T),
    /// The queue was closed.
    Closed(T),
}

impl<T> TryPutError<T> {
    /// Recover the item that could not be inserted.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for TryPutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TryPutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("queue is full"),
            Self::Closed(_) => f.write_str("queue is closed"),
        }
    }
}

impl<T> std::error::Error for TryPutError<T> {}

/// Error returned by [`BoundedQueue::take`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TakeError {
    /// The queue is closed and every remaining item has been drained.
    #[error("queue is closed and drained")]
    Closed,
    /// The wait was cancelled before an item became available.
    #[error("wait cancelled before an item became available")]
    Cancelled,
}

/// Circular buffer state, private to the queue and mutated only while the
/// lock is held.
struct Ring<T> {
    buffer: Box<[Option<T>]>,
    /// Index of the oldest occupied slot.
    head: usize,
    /// Index of the next free slot.
    tail: usize,
    /// Occupied slots, `0..=buffer.len()`.
    count: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
            closed: false,
        }
    }

    fn push(&mut self, item: T) {
        debug_assert!(self.count < self.buffer.len());
        self.buffer[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.buffer.len();
        self.count += 1;
    }

    fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.buffer[self.head].take();
        debug_assert!(item.is_some());
        self.head = (self.head + 1) % self.buffer.len();
        self.count -= 1;
        item
    }
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<Ring<T>>,
    /// Signalled by every successful `take` and on close.
    not_full: Condvar,
    /// Signalled by every successful `put` and on close.
    not_empty: Condvar,
}

impl<T: Send> WakeWaiters for Shared<T> {
    fn wake_all(&self) {
        // Taking the lock orders this wake after any waiter that saw the
        // cancel flag as clear: that waiter is either already parked or
        // will re-check the flag before parking.
        let _state = self.state.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

/// A fixed-capacity thread-safe FIFO queue with blocking hand-off.
///
/// Many producers and many consumers may operate concurrently; items come
/// out in the order their insertions completed, and the number of
/// outstanding items never exceeds the capacity fixed at construction.
///
/// # Examples
///
/// ```
/// use bounded_pool::{BoundedQueue, CancelToken};
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(BoundedQueue::new(2).unwrap());
///
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         let cancel = CancelToken::new();
///         for i in 0..10 {
///             // Blocks whenever the consumer is more than 2 items behind.
///             queue.put(i, &cancel).unwrap();
///         }
///     })
/// };
///
/// let cancel = CancelToken::new();
/// for expected in 0..10 {
///     assert_eq!(queue.take(&cancel).unwrap(), expected);
/// }
/// producer.join().unwrap();
/// ```
pub struct BoundedQueue<T> {
    // Shared indirection exists so cancel tokens can hold a weak wake
    // handle to the condvars without borrowing the queue.
    shared: Arc<Shared<T>>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(Ring::with_capacity(capacity)),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
        })
    }

    /// Insert without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TryPutError::Full`] when the queue is at capacity and
    /// [`TryPutError::Closed`] once [`close`](Self::close) has been called;
    /// both hand the item back.
    pub fn try_put(&self, item: T) -> Result<(), TryPutError<T>> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(TryPutError::Closed(item));
        }
        if state.count == self.shared.capacity {
            return Err(TryPutError::Full(item));
        }
        state.push(item);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Close the queue. Idempotent.
    ///
    /// Blocked putters wake and fail with `Closed`; blocked takers wake,
    /// drain whatever is left, and then observe `Closed`.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();
    }

    /// Number of items currently queued.
    ///
    /// Accurate only at the instant the internal lock was held; under
    /// concurrent mutation the value may be stale by the time it is read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().count
    }

    /// Whether the queue currently holds no items. Snapshot, like [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue is currently at capacity. Snapshot, like [`len`](Self::len).
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == self.shared.capacity
    }

    /// The fixed capacity chosen at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Insert `item`, blocking while the queue is full.
    ///
    /// On success exactly one thread blocked in [`take`](Self::take) is
    /// woken, if any. The wait re-checks its condition after every wake.
    ///
    /// # Errors
    ///
    /// Returns [`PutError::Closed`] once the queue is closed and
    /// [`PutError::Cancelled`] when `cancel` trips during the wait. Either
    /// way the queue is exactly as it was before the call and the item is
    /// handed back.
    pub fn put(&self, item: T, cancel: &CancelToken) -> Result<(), PutError<T>> {
        let mut state = self.shared.state.lock();
        let mut watching = false;
        loop {
            if state.closed {
                return Err(PutError::Closed(item));
            }
            if state.count < self.shared.capacity {
                state.push(item);
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(PutError::Cancelled(item));
            }
            if !watching {
                // Register before the first wait, then re-run the checks:
                // a cancel that fires in between either finds this thread
                // registered or is observed on the next flag check, because
                // its wake path takes the queue lock held here.
                let weak = Arc::downgrade(&self.shared);
                let waker: Weak<dyn WakeWaiters> = weak;
                cancel.watch(&waker);
                watching = true;
                continue;
            }
            self.shared.not_full.wait(&mut state);
        }
    }

    /// Remove the oldest item, blocking while the queue is empty.
    ///
    /// On success exactly one thread blocked in [`put`](Self::put) is
    /// woken, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TakeError::Closed`] only when the queue is closed *and*
    /// empty, evaluated together under the lock — an available item always
    /// wins over both closure and cancellation, so closing never strands
    /// queued items. Returns [`TakeError::Cancelled`] when `cancel` trips
    /// while the queue is empty.
    pub fn take(&self, cancel: &CancelToken) -> Result<T, TakeError> {
        let mut state = self.shared.state.lock();
        let mut watching = false;
        loop {
            if let Some(item) = state.pop() {
                self.shared.not_full.notify_one();
                return Ok(item);
            }
            if state.closed {
                return Err(TakeError::Closed);
            }
            if cancel.is_cancelled() {
                return Err(TakeError::Cancelled);
            }
            if !watching {
                let weak = Arc::downgrade(&self.shared);
                let waker: Weak<dyn WakeWaiters> = weak;
                cancel.watch(&waker);
                watching = true;
                continue;
            }
            self.shared.not_empty.wait(&mut state);
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.shared.capacity)
            .field("len", &state.count)
            .field("closed", &state.closed)
            .finish()
    }
}
