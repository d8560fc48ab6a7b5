//! Bounded retry decorator for a single async operation.
//!
//! [`RetryPolicy::run`] drives an operation until it succeeds or the attempt
//! budget (`retries + 1`) is spent, sleeping an [`ExponentialBackoff`] delay
//! between attempts. Failures that will be retried are reported through a
//! hook; the final failure is returned as [`RetryExhausted`] and reported by
//! no one here.

use std::fmt;
use std::future::Future;

use super::backoff::{BackoffConfig, ExponentialBackoff};

/// Default number of retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;

/// Retry policy: how many retries and how long to wait between them
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = retries + 1)
    pub retries: u32,
    /// Backoff between attempts
    pub backoff: BackoffConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff: BackoffConfig::default(),
        }
    }
}

/// A failed attempt that is about to be retried
#[derive(Debug)]
pub struct FailedAttempt<'a, E> {
    /// 1-based attempt number that failed
    pub attempt: u32,
    /// Attempts still available after this one
    pub retries_left: u32,
    pub error: &'a E,
}

/// Successful result together with the number of attempts it took
#[derive(Debug, Clone, PartialEq)]
pub struct Succeeded<T> {
    pub value: T,
    pub attempts: u32,
}

/// Every attempt failed
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

impl RetryPolicy {
    /// Create a policy with the given retry count and backoff
    pub fn new(retries: u32, backoff: BackoffConfig) -> Self {
        Self { retries, backoff }
    }

    /// Total number of attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Run `operation` until it succeeds or the attempts are exhausted.
    ///
    /// `operation` receives the 1-based attempt number. `on_failed_attempt`
    /// is called for every failure except the last one.
    pub async fn run<T, E, F, Fut, H>(
        &self,
        mut operation: F,
        mut on_failed_attempt: H,
    ) -> Result<Succeeded<T>, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(FailedAttempt<'_, E>),
    {
        let max_attempts = self.max_attempts();
        let mut backoff = ExponentialBackoff::with_config(self.backoff.clone());
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return Ok(Succeeded {
                        value,
                        attempts: attempt,
                    })
                }
                Err(error) if attempt >= max_attempts => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    })
                }
                Err(error) => {
                    on_failed_attempt(FailedAttempt {
                        attempt,
                        retries_left: max_attempts - attempt,
                        error: &error,
                    });
                }
            }

            tokio::time::sleep(backoff.next_delay()).await;
            attempt += 1;
        }
    }
}
