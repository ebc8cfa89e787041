//! Background worker that replays queued operations and runs recovery.
//!
//! The worker sleeps on the breaker condvar and wakes for three reasons only:
//! an operation was queued or the circuit closed, the recovery deadline of an
//! open circuit passed, or shutdown was requested.

use std::error::Error;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::breaker::Shared;
use crate::state::State;

const WORKER_NAME: &str = "circuit-breaker-drain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Drain,
    Recover,
    Shutdown,
}

/// Spawns the worker for `shared`. The thread is detached; it exits once
/// shutdown is requested.
pub(crate) fn spawn<E>(shared: Arc<Shared<E>>) -> io::Result<()>
where
    E: Error + Clone + Send + 'static,
{
    shared.worker_running.store(true, Ordering::Release);

    let worker = Arc::clone(&shared);
    let spawned = thread::Builder::new()
        .name(WORKER_NAME.into())
        .spawn(move || worker_loop(&worker));

    if let Err(e) = spawned {
        shared.worker_running.store(false, Ordering::Release);
        return Err(e);
    }

    Ok(())
}

// Clears the running flag however the worker exits, unwinding included.
struct Running<'a>(&'a AtomicBool);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn worker_loop<E>(shared: &Shared<E>)
where
    E: Error + Clone + Send + 'static,
{
    let _running = Running(&shared.worker_running);
    tracing::debug!("drain worker started");

    loop {
        match shared.next_task() {
            Task::Drain => shared.drain_pass(),
            Task::Recover => shared.recover(),
            Task::Shutdown => break,
        }
    }

    tracing::debug!("drain worker stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

impl<E> Shared<E>
where
    E: Error + Clone + Send + 'static,
{
    fn next_task(&self) -> Task {
        let mut ledger = self.ledger.lock();

        loop {
            if ledger.shutdown {
                return Task::Shutdown;
            }

            let state = ledger.state;
            match state {
                State::Open => match ledger.recovery.deadline() {
                    Some(_) if ledger.recovery.is_due(Instant::now()) => return Task::Recover,
                    Some(deadline) => {
                        let _ = self.wake.wait_until(&mut ledger, deadline);
                    }
                    None => self.wake.wait(&mut ledger),
                },
                _ if !ledger.queue.is_empty() => return Task::Drain,
                _ => self.wake.wait(&mut ledger),
            }
        }
    }

    /// Replays at most the operations queued when the pass starts. Failures
    /// re-enter the queue at the tail and wait for a later pass.
    fn drain_pass(&self) {
        let pending = self.ledger.lock().queue.len();
        tracing::trace!(pending, "drain pass");

        for _ in 0..pending {
            let op = {
                let mut ledger = self.ledger.lock();
                if ledger.shutdown {
                    break;
                }
                match ledger.queue.pop() {
                    Some(op) => op,
                    None => break,
                }
            };

            self.stats.record_replay();
            // The outcome is already accounted for by `execute`. A panicking
            // operation is lost, but the pass and the worker carry on.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.execute(op))) {
                tracing::error!(
                    panic = panic_message(payload.as_ref()),
                    "replayed operation panicked, discarding it"
                );
            }
        }

        let depth = self.ledger.lock().queue.len();
        self.metric_sink.record_queue_depth(depth);
    }

    /// open -> half-open, one drain pass, then a flush.
    fn recover(&self) {
        let mut ledger = self.ledger.lock();
        ledger.recovery.disarm();
        let transition = self.transition(&mut ledger, State::HalfOpen);
        let backlog = ledger.queue.len();
        drop(ledger);

        if let Some(transition) = transition {
            self.announce(transition);
        }

        tracing::debug!(backlog, "recovery timer fired");
        if backlog > 0 {
            self.drain_pass();
        }

        self.flush();
    }
}
