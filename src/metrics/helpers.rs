//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    EMAILS_ABANDONED_TOTAL, EMAILS_DELIVERED_TOTAL, EMAILS_ENQUEUED_TOTAL,
    EMAIL_ATTEMPTS, EMAIL_ATTEMPTS_FAILED_TOTAL, EMAIL_DELIVERY_LATENCY, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_LATENCY, QUEUE_IN_FLIGHT, QUEUE_PANICS_TOTAL, QUEUE_PENDING,
    TEMPLATE_CACHE_HITS, TEMPLATE_CACHE_MISSES,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording delivery metrics
pub struct EmailMetrics;

impl EmailMetrics {
    /// Record a message accepted onto the queue
    pub fn record_enqueued() {
        EMAILS_ENQUEUED_TOTAL.inc();
    }

    /// Record a delivered message and the attempts it took
    pub fn record_delivered(transport: &str, attempts: u32) {
        EMAILS_DELIVERED_TOTAL.with_label_values(&[transport]).inc();
        EMAIL_ATTEMPTS.observe(attempts as f64);
    }

    /// Record a message that exhausted its retries
    pub fn record_abandoned(attempts: u32) {
        EMAILS_ABANDONED_TOTAL.inc();
        EMAIL_ATTEMPTS.observe(attempts as f64);
    }

    /// Record one failed attempt. `kind` is "template", "transport", or "config".
    pub fn record_attempt_failed(kind: &str) {
        EMAIL_ATTEMPTS_FAILED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn observe_latency(elapsed: Duration) {
        EMAIL_DELIVERY_LATENCY.observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for delivery queue gauges
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn set_pending(count: usize) {
        QUEUE_PENDING.set(count as i64);
    }

    pub fn set_in_flight(count: usize) {
        QUEUE_IN_FLIGHT.set(count as i64);
    }

    pub fn record_panic() {
        QUEUE_PANICS_TOTAL.inc();
    }
}

/// Helper struct for template cache metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_hit() {
        TEMPLATE_CACHE_HITS.inc();
    }

    pub fn record_miss() {
        TEMPLATE_CACHE_MISSES.inc();
    }
}

/// Helper struct for HTTP API metrics
pub struct HttpMetrics;

impl HttpMetrics {
    /// Record a finished HTTP request
    pub fn record_request(method: &str, path: &str, status: u16, elapsed: Duration) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        HTTP_REQUEST_LATENCY
            .with_label_values(&[method, path])
            .observe(elapsed.as_secs_f64());
    }
}
