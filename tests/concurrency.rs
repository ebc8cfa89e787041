mod common;

use circuitbreaker_retry::{BreakerError, CircuitBreaker, State};
use common::{wait_for, TestError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREAD_COUNT: usize = 50;
const CALLS_PER_THREAD: usize = 20;

/// Succeeds on every other execution until `healthy` is set, then always.
fn flaky(
    executions: &Arc<AtomicUsize>,
    healthy: &Arc<AtomicBool>,
) -> impl FnMut() -> Result<(), TestError> + Send + 'static {
    let executions = Arc::clone(executions);
    let healthy = Arc::clone(healthy);
    move || {
        let n = executions.fetch_add(1, Ordering::SeqCst);
        if healthy.load(Ordering::SeqCst) || n % 2 == 1 {
            Ok(())
        } else {
            Err(TestError::new("flaky"))
        }
    }
}

#[test]
fn test_concurrent_callers_account_for_every_call() {
    let flushed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&flushed);

    let breaker = CircuitBreaker::<TestError>::builder()
        .timeout(Duration::from_secs(30))
        .flusher(move |errors| {
            counter.fetch_add(errors.len(), Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let executions = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));
    let outcomes = Arc::new([
        AtomicUsize::new(0),
        AtomicUsize::new(0),
        AtomicUsize::new(0),
    ]);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = Vec::with_capacity(THREAD_COUNT);

    for _ in 0..THREAD_COUNT {
        let breaker = breaker.clone();
        let barrier = Arc::clone(&barrier);
        let outcomes = Arc::clone(&outcomes);
        let executions = Arc::clone(&executions);
        let healthy = Arc::clone(&healthy);

        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..CALLS_PER_THREAD {
                let slot = match breaker.call(flaky(&executions, &healthy)) {
                    Ok(()) => 0,
                    Err(BreakerError::Operation(_)) => 1,
                    Err(BreakerError::Open) => 2,
                };
                outcomes[slot].fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREAD_COUNT * CALLS_PER_THREAD;
    let stats = breaker.stats();
    let [successes, failures, rejections] = [0, 1, 2].map(|i| outcomes[i].load(Ordering::SeqCst));

    assert_eq!(successes + failures + rejections, total);
    assert_eq!(stats.successes as usize, successes);
    assert_eq!(stats.failures as usize, failures);
    assert_eq!(stats.rejections as usize, rejections);
    assert_eq!(executions.load(Ordering::SeqCst), successes + failures);
    assert!(failures >= 1);

    // The circuit tripped and stayed open: nothing was replayed.
    assert_eq!(breaker.current_state(), State::Open);
    assert_eq!(stats.replays, 0);

    // Every failure and rejection is queued exactly once.
    assert_eq!(breaker.queued(), failures + rejections);

    // Every failure is either still logged or was reported by a flush.
    assert_eq!(
        breaker.logged_errors() + flushed.load(Ordering::SeqCst),
        failures
    );
}

#[test]
fn test_recovers_under_concurrent_load() {
    let breaker = CircuitBreaker::<TestError>::builder()
        .max_failures(3)
        .timeout(Duration::from_millis(20))
        .max_queue_capacity(64)
        .build()
        .unwrap();

    let executions = Arc::new(AtomicUsize::new(0));
    let healthy = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let breaker = breaker.clone();
            let barrier = Arc::clone(&barrier);
            let executions = Arc::clone(&executions);
            let healthy = Arc::clone(&healthy);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    let _ = breaker.call(flaky(&executions, &healthy));
                    assert!(breaker.queued() <= 64);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    healthy.store(true, Ordering::SeqCst);

    // Quiescent once closed, drained, and every execution is accounted for.
    let results = breaker.results();
    assert!(wait_for(Duration::from_secs(10), || {
        let stats = breaker.stats();
        breaker.current_state() == State::Closed
            && breaker.queued() == 0
            && (stats.successes + stats.failures) as usize == executions.load(Ordering::SeqCst)
            && results.pending() as u64 + results.dropped() == stats.successes
    }));

    let stats = breaker.stats();
    assert_eq!(breaker.logged_errors(), 0);
    assert_eq!(stats.flushed_errors, stats.failures);
    assert!(stats.replays > 0);
}
