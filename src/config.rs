//! Configuration for circuit breakers.

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, Flusher};
use crate::error::JoinedError;
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::queue::{OverflowPolicy, MIN_QUEUE_CAPACITY};
use crate::signal::DEFAULT_RESULTS_CAPACITY;

/// Lowest accepted failure threshold.
pub const MIN_FAILURES: usize = 2;

/// Timeout used when none (or a zero one) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Resolved settings handed to the breaker at start.
pub(crate) struct Settings<E> {
    pub(crate) max_failures: usize,
    pub(crate) timeout: Duration,
    pub(crate) queue_capacity: Option<usize>,
    pub(crate) overflow: OverflowPolicy,
    pub(crate) flusher: Option<Flusher<E>>,
    pub(crate) results_capacity: usize,
    pub(crate) metric_sink: Arc<dyn MetricSink>,
    pub(crate) hooks: Arc<HookRegistry>,
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<E>
where
    E: Error + Clone + Send + 'static,
{
    max_failures: usize,
    timeout: Duration,
    queue_capacity: Option<usize>,
    overflow: OverflowPolicy,
    flusher: Option<Flusher<E>>,
    results_capacity: usize,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
}

impl<E> Default for BreakerBuilder<E>
where
    E: Error + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BreakerBuilder<E>
where
    E: Error + Clone + Send + 'static,
{
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            max_failures: MIN_FAILURES,
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: None,
            overflow: OverflowPolicy::default(),
            flusher: None,
            results_capacity: DEFAULT_RESULTS_CAPACITY,
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
        }
    }

    /// Sets how many accumulated failures a half-open circuit tolerates before
    /// re-opening. Values below 2 are raised to 2.
    pub fn max_failures(mut self, max_failures: usize) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Sets how long the circuit stays open before probing recovery.
    /// A zero duration selects the 100ms default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bounds the retry queue.
    ///
    /// The bound is raised to at least 3 and at least the failure threshold.
    /// Without a bound the queue grows for as long as failures continue.
    pub fn max_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets what a full retry queue does with a new operation.
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Sets the callback receiving the accumulated errors on every flush
    /// where errors existed.
    pub fn flusher<F>(mut self, flusher: F) -> Self
    where
        F: Fn(JoinedError<E>) + Send + Sync + 'static,
    {
        self.flusher = Some(Box::new(flusher));
        self
    }

    /// Sets how many success notifications may be pending before new ones
    /// are dropped.
    pub fn results_capacity(mut self, capacity: usize) -> Self {
        self.results_capacity = capacity;
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    fn into_settings(self) -> Settings<E> {
        let max_failures = self.max_failures.max(MIN_FAILURES);
        let timeout = if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        };
        let queue_capacity = self
            .queue_capacity
            .map(|cap| cap.max(MIN_QUEUE_CAPACITY).max(max_failures));

        Settings {
            max_failures,
            timeout,
            queue_capacity,
            overflow: self.overflow,
            flusher: self.flusher,
            results_capacity: self.results_capacity.max(1),
            metric_sink: self.metric_sink,
            hooks: self.hook_registry,
        }
    }

    /// Builds the circuit breaker and starts its drain worker.
    ///
    /// Fails only if the worker thread cannot be spawned.
    pub fn build(self) -> io::Result<CircuitBreaker<E>> {
        let settings = self.into_settings();
        tracing::debug!(
            max_failures = settings.max_failures,
            timeout = ?settings.timeout,
            queue_capacity = ?settings.queue_capacity,
            "building circuit breaker"
        );

        CircuitBreaker::start(settings)
    }
}
