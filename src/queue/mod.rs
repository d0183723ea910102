//! Bounded FIFO sitting between the event-bus callers and a profile's worker.
//!
//! Any number of producers push without ever waiting: a push against a full
//! queue fails immediately and hands the item back. The single consumer pops
//! with a timeout so it can re-check its shutdown flag while idle.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Default number of messages a profile queue holds.
pub const DEFAULT_CAPACITY: usize = 5000;

/// Returned by a push against a full queue. Ownership of the item goes back
/// to the caller.
#[derive(Error)]
#[error("queue full (capacity {capacity})")]
pub struct QueueFull<T> {
    /// The rejected item
    pub item: T,
    /// Capacity of the queue that rejected it
    pub capacity: usize,
}

impl<T> QueueFull<T> {
    /// Take the rejected item back.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueFull")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity FIFO. `len() <= capacity()` always holds.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            ready: Condvar::new(),
            capacity,
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panicking producer cannot leave the deque half-modified.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item, failing immediately when the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), QueueFull<T>> {
        let mut items = self.items();
        if items.len() >= self.capacity {
            return Err(QueueFull {
                item,
                capacity: self.capacity,
            });
        }
        items.push_back(item);
        drop(items);
        self.ready.notify_one();
        Ok(())
    }

    /// Put an item back at the head, failing immediately when the queue is full.
    ///
    /// Used for a message whose delivery failed: it becomes the next item
    /// popped, so ordering relative to later events is kept.
    pub fn try_requeue(&self, item: T) -> Result<(), QueueFull<T>> {
        let mut items = self.items();
        if items.len() >= self.capacity {
            return Err(QueueFull {
                item,
                capacity: self.capacity,
            });
        }
        items.push_front(item);
        drop(items);
        self.ready.notify_one();
        Ok(())
    }

    /// Pop the oldest item, waiting at most `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items();

        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, _) = self
                .ready
                .wait_timeout(items, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            items = guard;
        }
    }

    /// Pop the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items().pop_front()
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        self.items().drain(..).collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Whether the next push would fail.
    pub fn is_full(&self) -> bool {
        self.items().len() >= self.capacity
    }

    /// Maximum number of items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
