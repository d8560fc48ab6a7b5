//! Exponential backoff between delivery attempts

use std::time::Duration;

use rand::Rng;

/// Exponential backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000, // 30 seconds
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

/// Exponential backoff calculator with optional jitter.
///
/// The first call to [`next_delay`](Self::next_delay) yields `initial_delay_ms`,
/// every following call multiplies the undisturbed base delay by `multiplier`.
/// Jitter is applied on top of the base and never feeds back into it.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    base_delay_ms: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with default configuration
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    /// Create a new exponential backoff with custom configuration
    pub fn with_config(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms as f64;
        Self {
            config,
            base_delay_ms: initial,
            attempt: 0,
        }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        if self.attempt > 0 {
            self.base_delay_ms *= self.config.multiplier;
        }
        self.attempt += 1;

        let capped_delay = self.base_delay_ms.min(self.config.max_delay_ms as f64);
        self.base_delay_ms = capped_delay;

        let jitter_range = capped_delay * self.config.jitter_factor;
        let final_delay = if jitter_range > 0.0 {
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay.max(0.0)
        };

        Duration::from_millis(final_delay as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}
