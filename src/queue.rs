//! Retry queue for operations that failed or were rejected.

use std::collections::VecDeque;
use std::fmt;

/// A queued unit of work. Replays call it again, so it must be reusable.
pub(crate) type Operation<E> = Box<dyn FnMut() -> Result<(), E> + Send + 'static>;

/// Smallest capacity accepted for a bounded queue.
pub(crate) const MIN_QUEUE_CAPACITY: usize = 3;

/// What a bounded retry queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest queued operation to make room for the new one.
    #[default]
    DropOldest,

    /// Keep the queue as is and discard the new operation.
    RejectNew,
}

/// Outcome of pushing onto the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Push {
    Queued,
    DroppedOldest,
    RejectedNew,
}

impl Push {
    pub(crate) fn discarded(self) -> bool {
        !matches!(self, Push::Queued)
    }
}

/// FIFO of pending operations with an optional capacity.
pub(crate) struct RetryQueue<E> {
    entries: VecDeque<Operation<E>>,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
}

impl<E> RetryQueue<E> {
    pub(crate) fn new(capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        let entries = match capacity {
            Some(cap) => VecDeque::with_capacity(cap),
            None => VecDeque::new(),
        };

        Self {
            entries,
            capacity,
            overflow,
        }
    }

    pub(crate) fn push(&mut self, op: Operation<E>) -> Push {
        let full = self
            .capacity
            .is_some_and(|cap| self.entries.len() >= cap);

        if !full {
            self.entries.push_back(op);
            return Push::Queued;
        }

        match self.overflow {
            OverflowPolicy::DropOldest => {
                self.entries.pop_front();
                self.entries.push_back(op);
                Push::DroppedOldest
            }
            OverflowPolicy::RejectNew => Push::RejectedNew,
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Operation<E>> {
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> fmt::Debug for RetryQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryQueue")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("overflow", &self.overflow)
            .finish()
    }
}
