//! Advanced Circuit Breaker Example
//!
//! This example demonstrates:
//! 1. Using hooks for monitoring circuit breaker events
//! 2. Consuming success notifications from another thread
//! 3. Bounding the retry queue
//! 4. Recovery without any caller involvement

use circuitbreaker_retry::{BreakerError, CircuitBreaker, HookRegistry, OverflowPolicy};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug, Clone)]
struct ServiceError(String);

impl ServiceError {
    fn new(msg: &str) -> Self {
        ServiceError(msg.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();

    println!("=== Advanced Circuit Breaker Example ===\n");

    // 1. Set up a hook registry for observability
    let hooks = HookRegistry::new();
    hooks.set_on_open(|| println!("Circuit OPENED, new work will be queued"));
    hooks.set_on_half_open(|| println!("Circuit HALF-OPEN, replaying queued work"));
    hooks.set_on_close(|| println!("Circuit CLOSED after successful recovery"));
    hooks.set_on_retry_dropped(|| println!("Retry queue full, oldest operation dropped"));

    // 2. Build a breaker with a bounded queue
    let breaker = CircuitBreaker::<ServiceError>::builder()
        .max_failures(2)
        .timeout(Duration::from_secs(1))
        .max_queue_capacity(5)
        .overflow_policy(OverflowPolicy::DropOldest)
        .hooks(hooks)
        .flusher(|errors| println!("Flushed {} errors", errors.len()))
        .build()?;

    // 3. Consume success notifications on a separate thread
    let results = breaker.results();
    let consumer = thread::spawn(move || {
        let mut seen = 0;
        while results.recv_timeout(Duration::from_secs(3)) {
            seen += 1;
        }
        seen
    });

    // 4. A downstream that is broken until we flip the switch
    let healthy = Arc::new(AtomicBool::new(false));

    for i in 1..=8 {
        let healthy = Arc::clone(&healthy);
        let result = breaker.call(move || {
            if healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ServiceError::new("Service temporarily unavailable"))
            }
        });

        match result {
            Ok(()) => println!("Request {}: success", i),
            Err(BreakerError::Open) => println!("Request {}: rejected, circuit open", i),
            Err(BreakerError::Operation(e)) => println!("Request {}: failed: {}", i, e),
        }
    }

    println!("\nQueued for replay: {}", breaker.queued());
    println!("Downstream recovers; waiting for the breaker to heal itself...\n");
    healthy.store(true, Ordering::SeqCst);

    thread::sleep(Duration::from_millis(1500));

    let stats = breaker.stats();
    println!("State: {}", breaker.current_state());
    println!("Queued: {}", breaker.queued());
    println!(
        "Successes: {}, failures: {}, rejections: {}, replays: {}, dropped: {}",
        stats.successes, stats.failures, stats.rejections, stats.replays, stats.dropped
    );

    breaker.close();

    let seen = consumer.join().map_err(|_| "consumer thread panicked")?;
    println!("Success notifications received: {}", seen);

    Ok(())
}
