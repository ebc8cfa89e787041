//! One-shot recovery timer armed whenever the breaker opens.

use std::time::{Duration, Instant};

/// Deadline after which an open breaker probes recovery.
///
/// Only the most recent arming counts: re-arming replaces the deadline, so a
/// timer armed by an earlier trip never fires on its own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecoveryTimer {
    deadline: Option<Instant>,
}

impl RecoveryTimer {
    pub(crate) fn arm(&mut self, now: Instant, timeout: Duration) {
        self.deadline = Some(now + timeout);
    }

    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|at| now >= at)
    }
}
