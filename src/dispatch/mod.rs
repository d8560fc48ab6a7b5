//! Delivery primitives: a FIFO executor and a retry decorator.
//!
//! The two are independent. The email service composes them by submitting a
//! retry-wrapped delivery as the task handed to the [`TaskQueue`].

mod backoff;
mod executor;
mod retry;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use executor::{QueueClosed, QueueStats, TaskQueue, DEFAULT_CONCURRENCY};
pub use retry::{FailedAttempt, RetryExhausted, RetryPolicy, Succeeded, DEFAULT_RETRIES};
