//! Token bucket admission control
//!
//! Tokens refill lazily from elapsed time whenever the bucket is touched, so
//! there is no background timer. Consumption never blocks: a denial is
//! reported immediately and the caller decides what to do with it.

use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Steady-rate limiter with burst capacity
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket
    ///
    /// `refill_rate` is in tokens per second. Negative or non-finite inputs
    /// are clamped to zero.
    #[must_use]
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        let capacity = sanitize(capacity);
        Self {
            capacity,
            refill_rate: sanitize(refill_rate),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Maximum number of tokens the bucket holds
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Try to take `n` tokens
    ///
    /// Returns `false` without consuming anything when fewer than `n` tokens
    /// are available. Asking for more than `capacity` always fails.
    pub fn consume(&self, n: f64) -> bool {
        let n = sanitize(n);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state);

        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Tokens currently available
    #[must_use]
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
