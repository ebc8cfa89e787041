//! Circuit breaker state machine implementation.

use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and operations run in the caller's thread.
    Closed = 0,

    /// Circuit is probing recovery; a bounded number of failures is tolerated.
    HalfOpen = 1,

    /// Circuit is open; operations are queued without running.
    Open = 2,
}

impl State {
    /// Returns a stable lowercase name, suitable for logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::HalfOpen => "half-open",
            State::Open => "open",
        }
    }

    /// Whether `self -> to` is one of the edges the breaker may take.
    ///
    /// Valid edges are `closed -> open`, `open -> half-open`,
    /// `half-open -> open` and `half-open -> closed`.
    pub fn can_transition_to(self, to: State) -> bool {
        matches!(
            (self, to),
            (State::Closed, State::Open)
                | (State::Open, State::HalfOpen)
                | (State::HalfOpen, State::Open)
                | (State::HalfOpen, State::Closed)
        )
    }

    /// The state the breaker moves to after a failed operation.
    ///
    /// `logged_errors` is the length of the error log *including* the failure
    /// being evaluated.
    pub fn next_on_failure(self, logged_errors: usize, max_failures: usize) -> State {
        match self {
            State::Closed => State::Open,
            State::HalfOpen if logged_errors > max_failures => State::Open,
            other => other,
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            1 => State::HalfOpen,
            2 => State::Open,
            _ => State::Closed,
        }
    }
}

/// A state change that was applied under the breaker lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}

/// Lock-free view of the breaker state.
///
/// The authoritative state lives next to the queue and error log under the
/// breaker mutex; this mirror is only written while that mutex is held.
pub(crate) struct StateManager {
    state: AtomicU8,
    last_transition: parking_lot::Mutex<Instant>,
}

impl StateManager {
    /// Creates a new state manager with the default closed state.
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Closed as u8),
            last_transition: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Gets the current state.
    pub(crate) fn current(&self) -> State {
        State::from(self.state.load(Ordering::Acquire))
    }

    /// Duration since the last state transition.
    pub(crate) fn time_in_state(&self) -> Duration {
        self.last_transition.lock().elapsed()
    }

    /// Moves the state along a valid edge.
    ///
    /// `authoritative` is the state slot guarded by the breaker mutex. Invalid
    /// edges and self-transitions are refused and return `None`.
    pub(crate) fn transition(&self, authoritative: &mut State, to: State) -> Option<Transition> {
        let from = *authoritative;
        if !from.can_transition_to(to) {
            return None;
        }

        *authoritative = to;
        self.state.store(to as u8, Ordering::Release);
        *self.last_transition.lock() = Instant::now();

        Some(Transition { from, to })
    }
}
