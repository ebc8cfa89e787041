//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust,no_run
//! use circuitbreaker_retry::prelude::*;
//! ```

pub use crate::{BreakerError, BreakerResult, CircuitBreaker, OverflowPolicy, State};
