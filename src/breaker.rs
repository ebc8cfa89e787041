//! Core circuit breaker implementation.

use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::{BreakerBuilder, Settings};
use crate::drain;
use crate::error::{BreakerError, BreakerResult, JoinedError};
use crate::hook::HookRegistry;
use crate::ledger::Ledger;
use crate::metrics::{BreakerStats, MetricSink, StatsSnapshot};
use crate::queue::{Operation, Push};
use crate::signal::Results;
use crate::state::{State, StateManager, Transition};

pub(crate) type Flusher<E> = Box<dyn Fn(JoinedError<E>) + Send + Sync + 'static>;

/// State shared between breaker handles and the drain worker.
pub(crate) struct Shared<E> {
    pub(crate) ledger: Mutex<Ledger<E>>,
    pub(crate) wake: Condvar,
    pub(crate) state: StateManager,
    pub(crate) worker_running: AtomicBool,
    pub(crate) stats: BreakerStats,
    pub(crate) metric_sink: Arc<dyn MetricSink>,
    max_failures: usize,
    timeout: Duration,
    flusher: Option<Flusher<E>>,
    results: Results,
    hooks: Arc<HookRegistry>,
}

impl<E> Shared<E> {
    fn new(settings: Settings<E>) -> Self {
        Self {
            ledger: Mutex::new(Ledger::new(settings.queue_capacity, settings.overflow)),
            wake: Condvar::new(),
            state: StateManager::new(),
            worker_running: AtomicBool::new(false),
            stats: BreakerStats::new(),
            metric_sink: settings.metric_sink,
            max_failures: settings.max_failures,
            timeout: settings.timeout,
            flusher: settings.flusher,
            results: Results::with_capacity(settings.results_capacity),
            hooks: settings.hooks,
        }
    }

    /// Applies a state change while the ledger lock is held, keeping the
    /// recovery timer in step: armed on every entry into open, disarmed otherwise.
    pub(crate) fn transition(&self, ledger: &mut Ledger<E>, to: State) -> Option<Transition> {
        let transition = self.state.transition(&mut ledger.state, to)?;

        if to == State::Open {
            ledger.recovery.arm(Instant::now(), self.timeout);
        } else {
            ledger.recovery.disarm();
        }

        Some(transition)
    }

    /// Reports a transition. Must be called after the ledger lock is released.
    pub(crate) fn announce(&self, transition: Transition) {
        let Transition { from, to } = transition;
        if to == State::Open {
            tracing::warn!(%from, %to, "circuit breaker state transition");
        } else {
            tracing::info!(%from, %to, "circuit breaker state transition");
        }

        self.hooks.execute_state_transition_hook(to);
        self.metric_sink
            .record_state_transition(from.as_str(), to.as_str());
    }

    /// Tells the drain worker to exit. Returns `false` if it was already told.
    pub(crate) fn shutdown(&self) -> bool {
        let mut ledger = self.ledger.lock();
        if ledger.shutdown {
            return false;
        }
        ledger.shutdown = true;
        let abandoned = ledger.queue.len();
        drop(ledger);

        self.wake.notify_all();
        tracing::info!(abandoned, "circuit breaker shutting down");
        true
    }

    fn record_discard(&self, push: Push) {
        if !push.discarded() {
            return;
        }

        tracing::warn!(outcome = ?push, "retry queue full, operation discarded");
        self.stats.record_dropped();
        self.metric_sink.record_retry_dropped();
        self.hooks.execute_retry_dropped_hook();
    }
}

impl<E> Shared<E>
where
    E: Error + Clone + Send + 'static,
{
    /// Runs `op` unless the circuit is open; shared by direct calls and replays.
    pub(crate) fn execute(&self, mut op: Operation<E>) -> BreakerResult<(), E> {
        if self.state.current() == State::Open {
            self.reject(op);
            return Err(BreakerError::Open);
        }

        let start = Instant::now();
        let result = op();
        let duration = start.elapsed();

        self.metric_sink.record_call(result.is_ok(), duration);

        match result {
            Ok(()) => {
                self.on_success();
                Ok(())
            }
            Err(e) => {
                self.on_failure(op, e.clone());
                Err(BreakerError::Operation(e))
            }
        }
    }

    fn reject(&self, op: Operation<E>) {
        let mut ledger = self.ledger.lock();
        let push = ledger.queue.push(op);
        let depth = ledger.queue.len();
        drop(ledger);

        // The breaker may have left open since the fast-path read.
        self.wake.notify_one();

        tracing::trace!(depth, "circuit open, operation queued");
        self.stats.record_rejection();
        self.metric_sink.record_rejection();
        self.metric_sink.record_queue_depth(depth);
        self.record_discard(push);
    }

    fn on_success(&self) {
        self.flush();
        self.stats.record_success();
        self.hooks.execute_success_hook();
        self.results.notify();
    }

    fn on_failure(&self, op: Operation<E>, error: E) {
        tracing::debug!(error = %error, "operation failed, queued for retry");

        let mut ledger = self.ledger.lock();
        let push = ledger.queue.push(op);
        ledger.errors.push(error);
        let next = ledger
            .state
            .next_on_failure(ledger.errors.len(), self.max_failures);
        let transition = self.transition(&mut ledger, next);
        let depth = ledger.queue.len();
        drop(ledger);

        self.wake.notify_one();

        self.stats.record_failure();
        self.hooks.execute_failure_hook();
        self.metric_sink.record_queue_depth(depth);
        self.record_discard(push);
        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    /// Resets the error log, closing the circuit unless it is open.
    pub(crate) fn flush(&self) {
        let mut ledger = self.ledger.lock();
        let transition = self.transition(&mut ledger, State::Closed);
        let joined = ledger.errors.take();
        drop(ledger);

        if let Some(transition) = transition {
            // Anything still queued can be replayed now.
            self.wake.notify_one();
            self.announce(transition);
        }

        let Some(joined) = joined else {
            return;
        };

        let count = joined.len();
        tracing::debug!(errors = count, "flushing error log");
        self.stats.record_flushed(count);
        self.metric_sink.record_flush(count);

        if let Some(flusher) = &self.flusher {
            flusher(joined);
        }
    }
}

// Owned by every `CircuitBreaker` clone; the last one to go stops the worker.
struct Handle<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Drop for Handle<E> {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

/// A circuit breaker that runs fallible operations, queues the ones that fail
/// and replays them in the background once the protected resource recovers.
///
/// While closed or half-open, [`call`](Self::call) runs the operation in the
/// calling thread and returns its real error on failure. While open, the
/// operation is queued without running and [`BreakerError::Open`] is returned.
/// A dedicated worker thread replays queued operations whenever the circuit is
/// not open, and moves an open circuit to half-open once the configured
/// timeout elapses.
///
/// Dropping the last handle stops the worker. A queued operation holding its
/// own clone keeps the breaker alive until it is replayed successfully, so
/// operations that need to reach the breaker should capture a
/// [`downgrade`](Self::downgrade)d handle instead.
pub struct CircuitBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    inner: Arc<Handle<E>>,
}

impl<E> CircuitBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder<E> {
        BreakerBuilder::new()
    }

    pub(crate) fn start(settings: Settings<E>) -> io::Result<Self> {
        let shared = Arc::new(Shared::new(settings));
        drain::spawn(Arc::clone(&shared))?;

        Ok(Self {
            inner: Arc::new(Handle { shared }),
        })
    }

    fn shared(&self) -> &Shared<E> {
        &self.inner.shared
    }

    /// Executes an operation through the circuit breaker.
    ///
    /// Returns `Ok(())` on success, [`BreakerError::Operation`] with the
    /// operation's own error on failure, or [`BreakerError::Open`] without
    /// running it when the circuit is open. In both error cases the operation
    /// is queued and will be replayed in the background; replay outcomes are
    /// not reported back to this caller.
    pub fn call<F>(&self, op: F) -> BreakerResult<(), E>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
    {
        self.shared().execute(Box::new(op))
    }

    /// Empties the error log, handing its contents to the flusher if any.
    ///
    /// Also closes a half-open circuit. An open circuit stays open; only the
    /// recovery timer moves it on. Calling this twice in a row reports the
    /// errors at most once.
    pub fn flush(&self) {
        self.shared().flush();
    }

    /// Creates a handle that does not keep the breaker or its worker alive.
    pub fn downgrade(&self) -> WeakBreaker<E> {
        WeakBreaker {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Success notifications, one per successful operation.
    pub fn results(&self) -> Results {
        self.shared().results.clone()
    }

    /// Stops the drain worker. Queued operations are abandoned.
    ///
    /// Returns promptly without waiting for the worker. Calls keep working
    /// afterwards, but nothing is replayed and an open circuit stays open.
    pub fn close(&self) {
        self.shared().shutdown();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared().ledger.lock().shutdown
    }

    /// Whether the drain worker thread is still alive.
    pub fn worker_running(&self) -> bool {
        self.shared().worker_running.load(Ordering::Acquire)
    }

    /// Gets the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.shared().state.current()
    }

    /// Time elapsed since the last state transition.
    pub fn time_in_state(&self) -> Duration {
        self.shared().state.time_in_state()
    }

    /// Number of operations waiting for replay.
    pub fn queued(&self) -> usize {
        self.shared().ledger.lock().queue.len()
    }

    /// Number of errors accumulated since the last flush.
    pub fn logged_errors(&self) -> usize {
        self.shared().ledger.lock().errors.len()
    }

    /// Snapshot of the breaker's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared().stats.snapshot()
    }

    /// Failures tolerated while half-open before the circuit re-opens.
    pub fn max_failures(&self) -> usize {
        self.shared().max_failures
    }

    /// How long the circuit stays open before probing recovery.
    pub fn timeout(&self) -> Duration {
        self.shared().timeout
    }
}

// Cheap: every clone drives the same breaker and worker.
impl<E> Clone for CircuitBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A non-owning breaker handle, see [`CircuitBreaker::downgrade`].
pub struct WeakBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    inner: Weak<Handle<E>>,
}

impl<E> WeakBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    /// Returns a full handle, or `None` once every strong handle is gone.
    pub fn upgrade(&self) -> Option<CircuitBreaker<E>> {
        self.inner.upgrade().map(|inner| CircuitBreaker { inner })
    }
}

impl<E> Clone for WeakBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E> std::fmt::Debug for WeakBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakBreaker")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<E> std::fmt::Debug for CircuitBreaker<E>
where
    E: Error + Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.current_state())
            .field("max_failures", &self.max_failures())
            .field("timeout", &self.timeout())
            .finish_non_exhaustive()
    }
}
