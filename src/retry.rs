//! Retry policy for the two network-bound backends.
//!
//! Translation and speech synthesis both talk to remote services that time
//! out now and then. Each call runs under a [`RetryPolicy`]:
//!
//! * `max_attempts` total attempts (not retries). Default: 3.
//! * `backoff`: delay before attempt `n + 1`. Default: flat 1 s.
//! * `retry_on`: which [`BackendError`]s are worth another attempt.
//!   Default: timeouts only.
//!
//! The outcome is a [`RetryOutcome`], never a bare `Result`: callers must
//! distinguish "gave up after the allowed attempts" from "the backend said
//! something retrying cannot fix".
//!
//! No delay is slept after the final attempt.

use crate::error::{millis, BackendError};
use crate::progress::PipelineProgressCallback;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base * 2^(retry - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based: the first retry is 1).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, max } => {
                let exp = retry.saturating_sub(1).min(31);
                base.saturating_mul(2u32.saturating_pow(exp)).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_secs(1))
    }
}

/// Which backend errors trigger another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Only [`BackendError::Timeout`]. (default)
    #[default]
    TimeoutsOnly,
    /// Timeouts, rate limits, 5xx and connection failures.
    Transient,
}

/// `{max_attempts, backoff, retryable predicate}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            retry_on: RetryOn::default(),
        }
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation succeeded on attempt `attempts`.
    Success { value: T, attempts: u32 },
    /// Every permitted attempt failed with a retryable error.
    Exhausted {
        attempts: u32,
        last_error: BackendError,
    },
    /// A non-retryable error ended the loop early.
    Fatal { attempt: u32, error: BackendError },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    /// Number of backend calls made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
            RetryOutcome::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            RetryOutcome::Success { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl RetryPolicy {
    /// Flat-delay policy with the given attempt bound.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
            retry_on: RetryOn::TimeoutsOnly,
        }
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether `err` earns another attempt under this policy.
    pub fn is_retryable(&self, err: &BackendError) -> bool {
        match self.retry_on {
            RetryOn::TimeoutsOnly => err.is_timeout(),
            RetryOn::Transient => err.is_transient(),
        }
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. `label` names the operation
    /// in logs and progress events.
    pub async fn run<T, F, Fut>(
        &self,
        label: &'static str,
        progress: &dyn PipelineProgressCallback,
        mut op: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    debug!(operation = label, attempt, "attempt succeeded");
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) if !self.is_retryable(&error) => {
                    warn!(operation = label, attempt, %error, "non-retryable failure");
                    return RetryOutcome::Fatal { attempt, error };
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(operation = label, attempts = attempt, %error, "attempts exhausted");
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    };
                }
                Err(error) => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = millis(delay),
                        %error,
                        "retrying"
                    );
                    progress.on_retry(label, attempt, max_attempts, &error.to_string());
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
