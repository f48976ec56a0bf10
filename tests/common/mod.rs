//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod sources;

use rtscope::Scope;
use std::time::{Duration, Instant};

/// Generous bound for anything that waits on the real-time thread
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Poll the scope until `done` holds or the timeout expires
pub fn poll_until(scope: &mut Scope, mut done: impl FnMut(&Scope) -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        scope.poll();
        if done(scope) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Stop the producer and drain everything it wrote
pub fn settle(scope: &mut Scope) {
    scope.set_running(false);
    // Let an in-flight period finish
    std::thread::sleep(Duration::from_millis(20));
    while scope.poll() > 0 {}
}
