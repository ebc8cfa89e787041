//! Success notifications.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_RESULTS_CAPACITY: usize = 64;

struct Inner {
    pending: Mutex<usize>,
    ready: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

/// Receiving side of the success notifications.
///
/// Every successful call posts one notification. Posting never blocks: once
/// `capacity` notifications are pending, further ones are counted as dropped
/// until a consumer catches up. Clones share the same pending count, so each
/// notification is observed by exactly one receiver.
#[derive(Clone)]
pub struct Results {
    inner: Arc<Inner>,
}

impl Results {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(0),
                ready: Condvar::new(),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn notify(&self) {
        let mut pending = self.inner.pending.lock();
        if *pending >= self.inner.capacity {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        *pending += 1;
        drop(pending);
        self.inner.ready.notify_one();
    }

    /// Consumes one notification if one is pending.
    pub fn try_recv(&self) -> bool {
        let mut pending = self.inner.pending.lock();
        if *pending == 0 {
            return false;
        }
        *pending -= 1;
        true
    }

    /// Waits up to `timeout` for a notification. Returns `false` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.inner.pending.lock();

        while *pending == 0 {
            if self.inner.ready.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        if *pending == 0 {
            return false;
        }
        *pending -= 1;
        true
    }

    /// Number of notifications waiting to be consumed.
    pub fn pending(&self) -> usize {
        *self.inner.pending.lock()
    }

    /// Number of notifications discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Maximum number of pending notifications.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("pending", &self.pending())
            .field("capacity", &self.inner.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}
