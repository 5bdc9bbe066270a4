//! Explicit retry wrapper with exponential backoff, kept apart from the operations it retries.
//!
//! ```text
//! attempt 1: immediate
//! attempt 2: wait initial_backoff
//! attempt 3: wait initial_backoff * multiplier
//! ...        capped at max_backoff, at most max_attempts in total
//! ```

use std::fmt::Display;
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never below 1.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_backoff: Duration, max_backoff: Duration, backoff_multiplier: f64) -> Self {
        Self { max_attempts: max_attempts.max(1), initial_backoff, max_backoff, backoff_multiplier }
    }

    /// No waiting between attempts; handy for tests and local mirrors.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Wait before retry number `retry` (0-indexed): min(initial * multiplier^retry, max).
    pub fn backoff(&self, retry: usize) -> Duration {
        let ms = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        Duration::from_millis(ms as u64).min(self.max_backoff)
    }
}

/// Run `operation` until it succeeds, returns an error `is_retryable` rejects,
/// or `policy.max_attempts` is exhausted. The last error is returned.
pub fn retry_with_backoff<T, E, F, R>(policy: &RetryPolicy, what: &str, is_retryable: R, mut operation: F) -> Result<T, E>
where
    F: FnMut(usize) -> Result<T, E>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt) {
            Ok(v) => {
                if attempt > 1 {
                    debug!(what, attempt, "succeeded after retry");
                }
                return Ok(v);
            }
            Err(e) if attempt < attempts && is_retryable(&e) => {
                let wait = policy.backoff(attempt - 1);
                warn!(what, attempt, max_attempts = attempts, wait_ms = wait.as_millis() as u64, error = %e, "transient failure, retrying");
                sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}
