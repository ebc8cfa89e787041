#![allow(dead_code)]

use std::error::Error;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

// Custom error type that implements Error trait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError(pub String);

impl TestError {
    pub fn new(msg: &str) -> Self {
        TestError(msg.to_string())
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test error: {}", self.0)
    }
}

impl Error for TestError {}

/// Polls `check` every few milliseconds until it holds or `limit` elapses.
pub fn wait_for<F: FnMut() -> bool>(limit: Duration, mut check: F) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
