use circuitbreaker_retry::{BreakerError, CircuitBreaker};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug, Clone)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let breaker = CircuitBreaker::<ServiceError>::builder()
        .max_failures(3) // tolerate 3 failures while probing recovery
        .timeout(Duration::from_millis(500)) // stay open for 500ms
        .flusher(|errors| println!("Recovered after {} errors:\n{}", errors.len(), errors))
        .build()?;

    println!("Circuit initial state: {:?}", breaker.current_state());

    // The service fails for its first calls, then recovers.
    let attempts = Arc::new(AtomicU32::new(0));

    for i in 1..=10 {
        let attempts = Arc::clone(&attempts);
        let result = breaker.call(move || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 4 {
                Err(ServiceError("External service error".to_string()))
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => println!("Attempt {}: call succeeded", i),
            Err(BreakerError::Open) => println!("Attempt {}: circuit open, call queued", i),
            Err(BreakerError::Operation(err)) => println!("Attempt {}: call failed: {}", i, err),
        }

        println!(
            "Current state: {:?}, queued: {}",
            breaker.current_state(),
            breaker.queued()
        );

        thread::sleep(Duration::from_millis(150));
    }

    breaker.close();
    Ok(())
}
