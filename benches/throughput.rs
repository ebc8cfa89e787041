use circuitbreaker_retry::CircuitBreaker;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::error::Error;
use std::fmt;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug, Clone)]
struct BenchError(String);

impl BenchError {
    fn new(msg: &str) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Benchmark error: {}", self.0)
    }
}

impl Error for BenchError {}

fn successful_operation() -> Result<(), BenchError> {
    Ok(())
}

fn failing_operation() -> Result<(), BenchError> {
    Err(BenchError::new("Simulated failure"))
}

fn bench_circuit_breaker_closed(c: &mut Criterion) {
    let breaker = CircuitBreaker::<BenchError>::builder()
        .timeout(Duration::from_secs(30))
        .results_capacity(1)
        .build()
        .expect("spawn drain worker");

    c.bench_function("circuit_breaker_closed_success", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_circuit_breaker_open(c: &mut Criterion) {
    // A bounded queue keeps memory flat while every call is rejected.
    let breaker = CircuitBreaker::<BenchError>::builder()
        .timeout(Duration::from_secs(3600))
        .max_queue_capacity(1024)
        .build()
        .expect("spawn drain worker");
    let _ = breaker.call(failing_operation);

    c.bench_function("circuit_breaker_open_rejection", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_circuit_breaker_concurrent(c: &mut Criterion) {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    const THREAD_COUNT: usize = 4;
    const ITERATIONS_PER_THREAD: usize = 1000;

    // One failure in 64 keeps the breaker cycling through open and recovery.
    let breaker = CircuitBreaker::<BenchError>::builder()
        .timeout(Duration::from_millis(1))
        .max_queue_capacity(256)
        .results_capacity(1)
        .build()
        .expect("spawn drain worker");
    let counter = AtomicU64::new(0);

    c.bench_function("circuit_breaker_concurrent_mixed", |b| {
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..THREAD_COUNT {
                    scope.spawn(|| {
                        for _ in 0..ITERATIONS_PER_THREAD {
                            let n = counter.fetch_add(1, Ordering::Relaxed);
                            let op = if n % 64 == 0 {
                                failing_operation
                            } else {
                                successful_operation
                            };
                            let _ = black_box(breaker.call(op));
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_circuit_breaker_closed,
    bench_circuit_breaker_open,
    bench_circuit_breaker_concurrent
);
criterion_main!(benches);
