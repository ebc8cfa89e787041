//! The consistency unit guarded by the breaker mutex.

use smallvec::SmallVec;

use crate::error::JoinedError;
use crate::queue::{OverflowPolicy, RetryQueue};
use crate::recovery::RecoveryTimer;
use crate::state::State;

/// Errors observed since the last flush, oldest first.
pub(crate) struct ErrorLog<E> {
    errors: SmallVec<[E; 4]>,
}

impl<E> ErrorLog<E> {
    pub(crate) fn new() -> Self {
        Self {
            errors: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, error: E) {
        self.errors.push(error);
    }

    pub(crate) fn len(&self) -> usize {
        self.errors.len()
    }

    /// Empties the log, returning its contents if there were any.
    pub(crate) fn take(&mut self) -> Option<JoinedError<E>> {
        if self.errors.is_empty() {
            return None;
        }

        let errors = std::mem::take(&mut self.errors);
        Some(JoinedError::new(errors.into_vec()))
    }
}

/// State, error log, retry queue, recovery deadline and shutdown flag.
///
/// These are only ever mutated together under one lock so that a partial
/// update (queued but not logged, logged but not transitioned) is never seen.
pub(crate) struct Ledger<E> {
    pub(crate) state: State,
    pub(crate) errors: ErrorLog<E>,
    pub(crate) queue: RetryQueue<E>,
    pub(crate) recovery: RecoveryTimer,
    pub(crate) shutdown: bool,
}

impl<E> Ledger<E> {
    pub(crate) fn new(queue_capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            state: State::Closed,
            errors: ErrorLog::new(),
            queue: RetryQueue::new(queue_capacity, overflow),
            recovery: RecoveryTimer::default(),
            shutdown: false,
        }
    }
}
