//! Outbound call pacing and retry.
//!
//! Every network call the engine makes passes through a [`RateLimiter`]
//! (minimum inter-call spacing, applied before each attempt) and a
//! [`RetryPolicy`] (capped exponential backoff for transient failures).
//! The last-call stamp is the only mutable shared state in the core; it is
//! mutex-guarded so a parallel caller would still be paced correctly.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::warn;

use crate::error::SourceError;

/// Enforces a minimum spacing between outbound calls.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until at least `min_interval` has passed since the previous
    /// call, then stamp the current time.
    pub async fn pace(&self) {
        let wait_for = {
            let last = self.last_call.lock().unwrap();
            last.map(|t| self.min_interval.saturating_sub(t.elapsed()))
        };

        if let Some(remaining) = wait_for {
            if !remaining.is_zero() {
                sleep(remaining).await;
            }
        }

        let mut last = self.last_call.lock().unwrap();
        *last = Some(Instant::now());
    }
}

/// Capped exponential backoff for transient source failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Run `op`, retrying transient failures with doubling delay up to
    /// `max_attempts` total attempts. Non-transient errors and exhaustion
    /// propagate to the caller; business outcomes inside `Ok` are never
    /// retried.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "transient source error, backing off");
                    sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.max_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
