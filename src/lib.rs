//! # circuitbreaker-retry
//!
//! A self-healing circuit breaker that queues failed work for replay.
//!
//! Every failed or rejected operation is kept in a retry queue. A background
//! worker replays the queue whenever the circuit is not open, and an open
//! circuit probes recovery on its own once a cooldown elapses, so no external
//! supervision is needed.
//!
//! ## States
//!
//! - **Closed**: operations run in the caller's thread. Any failure opens the circuit.
//! - **Open**: operations are queued without running and the call returns
//!   [`BreakerError::Open`]. After the timeout the circuit becomes half-open.
//! - **Half-Open**: operations run again. Up to `max_failures` accumulated
//!   failures are tolerated before the circuit re-opens; a success closes it.
//!
//! ## Basic Usage
//!
//! ```rust
//! use circuitbreaker_retry::{BreakerError, CircuitBreaker, State};
//! use std::error::Error;
//! use std::fmt;
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "service error: {}", self.0)
//!     }
//! }
//!
//! impl Error for ServiceError {}
//!
//! let breaker = CircuitBreaker::<ServiceError>::builder()
//!     .max_failures(3)
//!     .timeout(Duration::from_secs(30))
//!     .flusher(|errors| eprintln!("recovered after:\n{}", errors))
//!     .build()
//!     .expect("spawn drain worker");
//!
//! assert!(breaker.call(|| Ok(())).is_ok());
//!
//! match breaker.call(|| Err(ServiceError("unavailable".into()))) {
//!     Err(BreakerError::Operation(err)) => println!("call failed: {}", err),
//!     other => unreachable!("{:?}", other),
//! }
//!
//! // The failure opened the circuit: new work is queued instead of run.
//! assert_eq!(breaker.current_state(), State::Open);
//! assert!(matches!(breaker.call(|| Ok(())), Err(BreakerError::Open)));
//! assert_eq!(breaker.queued(), 2);
//!
//! breaker.close();
//! ```
//!
//! ## Features
//!
//! - `prometheus` - Prometheus metrics integration

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
mod drain;
mod error;
mod hook;
mod ledger;
mod metrics;
pub mod prelude;
mod queue;
mod recovery;
mod signal;
mod state;

// Re-exports
pub use breaker::{CircuitBreaker, WeakBreaker};
pub use config::{BreakerBuilder, DEFAULT_TIMEOUT, MIN_FAILURES};
pub use error::{BreakerError, BreakerResult, JoinedError};
pub use hook::HookRegistry;
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusMetricSink;
pub use metrics::{MetricSink, NullMetricSink, StatsSnapshot};
pub use queue::OverflowPolicy;
pub use signal::Results;
pub use state::State;
