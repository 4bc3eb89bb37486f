//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
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

/// Assert every sample of `data` is within `epsilon` of `expected`
pub fn assert_all_near(data: &[f32], expected: f32, epsilon: f32) {
    for (i, &v) in data.iter().enumerate() {
        assert!(
            (v - expected).abs() <= epsilon,
            "Sample {} is {}, expected {} (epsilon: {})",
            i,
            v,
            expected,
            epsilon
        );
    }
}
