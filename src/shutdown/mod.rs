//! Graceful shutdown handling for the mail service.
//!
//! Once the HTTP server has stopped accepting requests, the delivery queue is
//! closed and given a bounded amount of time to finish what was already
//! queued, retries and backoff included.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::email::EmailService;

/// Handles graceful shutdown of the mail service
pub struct GracefulShutdown {
    email: Arc<EmailService>,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(email: Arc<EmailService>, drain_timeout: Duration) -> Self {
        Self {
            email,
            drain_timeout,
        }
    }

    /// Execute the shutdown sequence
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let before = self.email.queue_stats();

        tracing::info!(
            reason = %reason,
            pending = before.pending,
            in_flight = before.in_flight,
            "Starting graceful shutdown: draining email queue"
        );

        let queue_drained = match timeout(self.drain_timeout, self.email.shutdown()).await {
            Ok(()) => {
                tracing::info!("Email queue drained");
                true
            }
            Err(_) => {
                let stats = self.email.queue_stats();
                tracing::warn!(
                    pending = stats.pending,
                    in_flight = stats.in_flight,
                    "Queue drain timeout, undelivered messages will be lost"
                );
                false
            }
        };

        let after = self.email.queue_stats();
        let result = ShutdownResult {
            queue_drained,
            delivered_during_drain: after.completed.saturating_sub(before.completed),
            remaining: after.pending + after.in_flight,
            duration: start.elapsed(),
        };

        tracing::info!(
            queue_drained = result.queue_drained,
            delivered_during_drain = result.delivered_during_drain,
            remaining = result.remaining,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether every queued send settled before the timeout
    pub queue_drained: bool,
    /// Sends that finished while draining
    pub delivered_during_drain: u64,
    /// Sends still pending or in flight when shutdown returned
    pub remaining: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}
