//! Retry policy with exponential backoff.

use std::future::Future;

use tokio::time::Duration;

use crate::cancel::CancelFlag;
use crate::error::FetchError;

/// Suspends between attempts. Injected so tests need not wait.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How many times to try a request and how long to wait in between.
///
/// The wait after attempt `n` is `backoff_unit * backoff_factor^(n-1)`:
/// 1s, 1.5s, 2.25s, 3.375s with the defaults. There is no wait after the
/// final attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: 1.5,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_factor: 1.0,
            backoff_unit: Duration::ZERO,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.backoff_unit.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(self.backoff_unit)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the attempt number. Returns the last error on failure,
    /// or [`FetchError::Cancelled`] if `cancel` is set before an attempt.
    pub async fn run<T, F, Fut, S>(
        &self,
        sleeper: &S,
        cancel: &CancelFlag,
        label: &str,
        mut op: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        S: Sleeper,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_transient() {
                log::warn!("Attempt {}: {} failed permanently: {}", attempt, label, err);
                return Err(err);
            }
            log::warn!("Attempt {}/{}: {} failed: {}", attempt, max_attempts, label, err);

            if attempt >= max_attempts {
                return Err(err);
            }
            sleeper.sleep(self.delay_for(attempt)).await;
            attempt += 1;
        }
    }
}
