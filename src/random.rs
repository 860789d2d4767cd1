//! Random number source for placeholder record data
//!
//! Online status, engagement counters and publish dates are not provided by the
//! API. They are drawn from a `RandomSource` so production uses the thread RNG
//! and tests use fixed values.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::RngExt;

/// Produces uniformly distributed values in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn unit(&self) -> f64;
}

/// Random source backed by the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn unit(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn unit(&self) -> f64 {
        self.0.clamp(0.0, 0.999_999)
    }
}

/// Cycles through a fixed list of values
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<f64>,
    next: AtomicUsize,
}

impl SequenceRandom {
    /// Creates a sequence; an empty list behaves like `FixedRandom(0.0)`
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            next: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn unit(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.values.len();
        self.values[i].clamp(0.0, 0.999_999)
    }
}
