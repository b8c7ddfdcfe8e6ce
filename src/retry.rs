//! Bounded retry for fallible initialization steps
//!
//! Used around model loading, where a transient failure (hub download,
//! cache lock) should not immediately take the service down.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::sleep;

/// How the delay grows between attempts
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay multiplied by `multiplier` after each failed attempt
    Exponential { multiplier: f64 },
}

/// Retry configuration
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub delay: Duration,
    pub backoff: Backoff,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            ..Default::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { multiplier } => {
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                // Clamp before building the Duration, large exponents overflow it
                let secs = (self.delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
                Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
            }
        };
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Returns the last error once `max_attempts` attempts have failed. A policy
/// with `max_attempts == 0` still runs the operation once.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {:?}",
                    what, attempt, max_attempts, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("{} failed after {} attempt(s): {}", what, attempt, e);
                return Err(e);
            }
        }
    }
}
