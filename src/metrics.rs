//! Call accounting and metric sinks for the circuit breaker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for metrics sinks that can receive circuit breaker events.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, from: &str, to: &str);

    /// Records the outcome and duration of an operation that actually ran.
    fn record_call(&self, success: bool, duration: Duration);

    /// Records a call rejected because the circuit was open.
    fn record_rejection(&self);

    /// Records the retry queue length after it changed.
    fn record_queue_depth(&self, depth: usize);

    /// Records an operation discarded by a full retry queue.
    fn record_retry_dropped(&self);

    /// Records a flush that reported `errors` accumulated errors.
    fn record_flush(&self, errors: usize);
}

/// A null metrics sink that discards all events.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: &str, _to: &str) {}
    fn record_call(&self, _success: bool, _duration: Duration) {}
    fn record_rejection(&self) {}
    fn record_queue_depth(&self, _depth: usize) {}
    fn record_retry_dropped(&self) {}
    fn record_flush(&self, _errors: usize) {}
}

/// Point-in-time copy of a breaker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Operations that ran and succeeded.
    pub successes: u64,
    /// Operations that ran and failed.
    pub failures: u64,
    /// Calls rejected without running because the circuit was open.
    pub rejections: u64,
    /// Queue entries handed back to the call path by the drain worker.
    pub replays: u64,
    /// Operations discarded by a full retry queue.
    pub dropped: u64,
    /// Errors reported through flushes.
    pub flushed_errors: u64,
}

/// Counters for the circuit breaker.
#[derive(Debug, Default)]
pub(crate) struct BreakerStats {
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    replays: AtomicU64,
    dropped: AtomicU64,
    flushed_errors: AtomicU64,
}

impl BreakerStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replay(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self, errors: usize) {
        self.flushed_errors
            .fetch_add(errors as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            flushed_errors: self.flushed_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "prometheus")]
pub use self::prometheus::PrometheusMetricSink;

#[cfg(feature = "prometheus")]
mod prometheus {
    use super::MetricSink;
    use prometheus_client::encoding::EncodeLabelSet;
    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::metrics::gauge::Gauge;
    use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
    use prometheus_client::registry::Registry;
    use std::time::Duration;

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct TransitionLabels {
        from: String,
        to: String,
    }

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct OutcomeLabels {
        outcome: String,
    }

    /// A [`MetricSink`] backed by a `prometheus-client` registry.
    #[derive(Clone)]
    pub struct PrometheusMetricSink {
        transitions: Family<TransitionLabels, Counter>,
        calls: Family<OutcomeLabels, Counter>,
        call_duration: Histogram,
        rejections: Counter,
        queue_depth: Gauge,
        retry_dropped: Counter,
        flushed_errors: Counter,
    }

    impl PrometheusMetricSink {
        /// Creates the metrics and registers them under the `circuit_breaker` prefix.
        pub fn register(registry: &mut Registry) -> Self {
            let sink = Self {
                transitions: Family::default(),
                calls: Family::default(),
                call_duration: Histogram::new(exponential_buckets(0.0005, 2.0, 16)),
                rejections: Counter::default(),
                queue_depth: Gauge::default(),
                retry_dropped: Counter::default(),
                flushed_errors: Counter::default(),
            };

            let registry = registry.sub_registry_with_prefix("circuit_breaker");
            registry.register(
                "transitions",
                "State transitions by edge",
                sink.transitions.clone(),
            );
            registry.register("calls", "Operations run, by outcome", sink.calls.clone());
            registry.register(
                "call_duration_seconds",
                "Wall time of operations that ran",
                sink.call_duration.clone(),
            );
            registry.register(
                "rejections",
                "Calls queued without running because the circuit was open",
                sink.rejections.clone(),
            );
            registry.register(
                "queue_depth",
                "Operations waiting for replay",
                sink.queue_depth.clone(),
            );
            registry.register(
                "retry_dropped",
                "Operations discarded by a full retry queue",
                sink.retry_dropped.clone(),
            );
            registry.register(
                "flushed_errors",
                "Errors reported through flushes",
                sink.flushed_errors.clone(),
            );

            sink
        }
    }

    impl MetricSink for PrometheusMetricSink {
        fn record_state_transition(&self, from: &str, to: &str) {
            self.transitions
                .get_or_create(&TransitionLabels {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .inc();
        }

        fn record_call(&self, success: bool, duration: Duration) {
            let outcome = if success { "success" } else { "failure" };
            self.calls
                .get_or_create(&OutcomeLabels {
                    outcome: outcome.to_string(),
                })
                .inc();
            self.call_duration.observe(duration.as_secs_f64());
        }

        fn record_rejection(&self) {
            self.rejections.inc();
        }

        fn record_queue_depth(&self, depth: usize) {
            self.queue_depth
                .set(i64::try_from(depth).unwrap_or(i64::MAX));
        }

        fn record_retry_dropped(&self) {
            self.retry_dropped.inc();
        }

        fn record_flush(&self, errors: usize) {
            self.flushed_errors.inc_by(errors as u64);
        }
    }
}
