//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Result type for circuit breaker operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error type for circuit breaker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was queued for replay instead of running.
    Open,

    /// The operation ran and failed. It has also been queued for replay.
    Operation(E),
}

impl<E> BreakerError<E> {
    /// Returns `true` if the call was rejected because the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open)
    }

    /// Returns the operation's own error, if the operation ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::Open => None,
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit breaker is open"),
            BreakerError::Operation(e) => write!(f, "operation error: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Open => None,
            BreakerError::Operation(e) => Some(e),
        }
    }
}

/// The errors accumulated since the previous flush, in the order they occurred.
///
/// Handed to the flusher as a single value. Its `Display` output is each member
/// on its own line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedError<E> {
    errors: Vec<E>,
}

impl<E> JoinedError<E> {
    pub(crate) fn new(errors: Vec<E>) -> Self {
        Self { errors }
    }

    /// Number of joined errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no errors were joined.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates the joined errors, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.errors.iter()
    }

    /// Consumes the value and returns the underlying errors.
    pub fn into_inner(self) -> Vec<E> {
        self.errors
    }
}

impl<'a, E> IntoIterator for &'a JoinedError<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl<E: Display> Display for JoinedError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl<E: Error> Error for JoinedError<E> {}
