//! Retry with fixed or exponential backoff, and primary/fallback composition.
//!
//! [`RetryPolicy::retry`] re-runs an async operation until it succeeds or
//! `max_attempts` runs have failed, sleeping between attempts. Use
//! [`RetryPolicy::retry_when`] to stop early on permanent errors, for
//! example with [`is_transient`] for model calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::LlmError;

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * multiplier^n`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_secs(1))
    }
}

/// How many times to run an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total runs including the first. `0` is treated as `1`.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(500),
                max: Duration::from_secs(8),
                multiplier: 2.0,
            },
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let base = initial.as_secs_f64() * multiplier.powi(exponent);
                Duration::from_secs_f64(base.min(max.as_secs_f64()))
            }
        }
    }

    /// Run `op` until it succeeds or every attempt has failed. The last
    /// error is returned.
    pub async fn retry<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_when(op, |_| true).await
    }

    /// Like [`retry`](Self::retry), but gives up immediately on errors for
    /// which `should_retry` returns `false`.
    pub async fn retry_when<T, E, F, Fut, P>(&self, mut op: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts || !should_retry(&e) => return Err(e),
                Err(e) => {
                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        "Attempt {attempt}/{attempts} failed: {e}; retrying in {:.2}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Run `primary`; if it fails, log a warning and run `fallback` instead.
pub async fn with_fallback<T, E, P, F, Fut>(primary: P, fallback: F) -> Result<T, E>
where
    P: Future<Output = Result<T, E>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match primary.await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Primary operation failed: {e}, using fallback...");
            fallback().await
        }
    }
}

/// Whether a model error is worth retrying: network failures, rate limits
/// and server errors. Client errors (400, 401, 403, 404, 422) are permanent.
pub fn is_transient(error: &LlmError) -> bool {
    match error {
        LlmError::Request(_) => true,
        LlmError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
        _ => false,
    }
}
