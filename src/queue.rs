//! Bounded blocking FIFO, the baseline the ring buffer is measured against.
//!
//! One `parking_lot::Mutex` around a `VecDeque` plus `not_full` / `not_empty`
//! condition variables. `put` blocks while the queue holds `capacity` items,
//! `take` blocks while it is empty. `close()` is a hard stop: every blocked
//! and future `put`/`take` returns `Halted`.

use std::collections::VecDeque;
use std::time::{ Duration, Instant };

use parking_lot::{ Condvar, Mutex, MutexGuard };

use crate::error::{ HandoffError, Result };

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BoundedBlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedBlockingQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(HandoffError::config("Queue capacity must be greater than 0"));
        }
        Ok(Self {
            // Grow on demand; default capacities are far above typical occupancy
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Append `value`, waiting while the queue is full.
    pub fn put(&self, value: T) -> Result<()> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(HandoffError::Halted);
            }
            if inner.items.len() < self.capacity {
                self.push(inner, value);
                return Ok(());
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Append `value` if there is room; `QueueFull` otherwise.
    pub fn try_put(&self, value: T) -> Result<()> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(HandoffError::Halted);
        }
        if inner.items.len() >= self.capacity {
            return Err(HandoffError::QueueFull);
        }
        self.push(inner, value);
        Ok(())
    }

    /// `put` that gives up with `Timeout` after `timeout`.
    pub fn put_timeout(&self, value: T, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(HandoffError::Halted);
            }
            if inner.items.len() < self.capacity {
                self.push(inner, value);
                return Ok(());
            }
            if self.not_full.wait_until(&mut inner, deadline).timed_out() {
                if !inner.closed && inner.items.len() < self.capacity {
                    self.push(inner, value);
                    return Ok(());
                }
                return Err(HandoffError::Timeout);
            }
        }
    }

    /// Remove the oldest item, waiting while the queue is empty.
    pub fn take(&self) -> Result<T> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(HandoffError::Halted);
            }
            if let Some(value) = self.pop(&mut inner) {
                return Ok(value);
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_take(&self) -> Result<Option<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(HandoffError::Halted);
        }
        Ok(self.pop(&mut inner))
    }

    /// `take` that gives up with `Timeout` after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(HandoffError::Halted);
            }
            if let Some(value) = self.pop(&mut inner) {
                return Ok(value);
            }
            if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                return self.pop(&mut inner).ok_or(HandoffError::Timeout);
            }
        }
    }

    /// Wake all waiters and fail every further `put`/`take` with `Halted`.
    /// Items still queued are discarded with the queue.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn push(&self, mut inner: MutexGuard<'_, Inner<T>>, value: T) {
        inner.items.push_back(value);
        drop(inner);
        self.not_empty.notify_one();
    }

    fn pop(&self, inner: &mut MutexGuard<'_, Inner<T>>) -> Option<T> {
        let value = inner.items.pop_front()?;
        self.not_full.notify_one();
        Some(value)
    }
}

impl<T> std::fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedBlockingQueue")
            .field("capacity", &self.capacity)
            .field("len", &inner.items.len())
            .field("closed", &inner.closed)
            .finish()
    }
}
