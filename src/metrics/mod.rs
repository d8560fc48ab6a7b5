//! Prometheus metrics for the mail service.
//!
//! This module provides metrics for monitoring outbound mail:
//! - Delivery metrics (enqueued, delivered, abandoned, failed attempts)
//! - Queue metrics (pending and in-flight deliveries)
//! - Template cache metrics
//! - HTTP API metrics

mod helpers;

pub use helpers::{encode_metrics, EmailMetrics, HttpMetrics, QueueMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "mailer";

lazy_static! {
    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Messages accepted onto the delivery queue
    pub static ref EMAILS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_emails_enqueued_total", METRIC_PREFIX),
        "Total messages accepted for delivery"
    ).unwrap();

    /// Messages accepted by a transport
    pub static ref EMAILS_DELIVERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_emails_delivered_total", METRIC_PREFIX),
        "Total messages delivered",
        &["transport"]
    ).unwrap();

    /// Messages given up on after every attempt failed
    pub static ref EMAILS_ABANDONED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_emails_abandoned_total", METRIC_PREFIX),
        "Total messages abandoned after exhausting retries"
    ).unwrap();

    /// Individual failed attempts, whether or not they were retried
    pub static ref EMAIL_ATTEMPTS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_email_attempts_failed_total", METRIC_PREFIX),
        "Total failed delivery attempts",
        &["kind"]
    ).unwrap();

    /// Attempts used per finished message
    pub static ref EMAIL_ATTEMPTS: Histogram = register_histogram!(
        format!("{}_email_attempts", METRIC_PREFIX),
        "Delivery attempts per finished message",
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 8.0]
    ).unwrap();

    /// Time from dequeue to terminal outcome, retries included
    pub static ref EMAIL_DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_email_delivery_latency_seconds", METRIC_PREFIX),
        "Delivery latency in seconds including retries",
        vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Deliveries waiting for a slot
    pub static ref QUEUE_PENDING: IntGauge = register_int_gauge!(
        format!("{}_queue_pending", METRIC_PREFIX),
        "Deliveries waiting in the queue"
    ).unwrap();

    /// Deliveries currently running
    pub static ref QUEUE_IN_FLIGHT: IntGauge = register_int_gauge!(
        format!("{}_queue_in_flight", METRIC_PREFIX),
        "Deliveries currently in flight"
    ).unwrap();

    /// Queued tasks that panicked
    pub static ref QUEUE_PANICS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_panics_total", METRIC_PREFIX),
        "Total queued tasks that panicked"
    ).unwrap();

    // ============================================================================
    // Template Metrics
    // ============================================================================

    pub static ref TEMPLATE_CACHE_HITS: IntCounter = register_int_counter!(
        format!("{}_template_cache_hits_total", METRIC_PREFIX),
        "Template loads served from the cache"
    ).unwrap();

    pub static ref TEMPLATE_CACHE_MISSES: IntCounter = register_int_counter!(
        format!("{}_template_cache_misses_total", METRIC_PREFIX),
        "Template loads that read from storage"
    ).unwrap();

    // ============================================================================
    // HTTP API Metrics
    // ============================================================================

    /// HTTP request counter by method and path
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_http_requests_total", METRIC_PREFIX),
        "Total HTTP requests",
        &["method", "path", "status"]
    ).unwrap();

    /// HTTP request latency
    pub static ref HTTP_REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_http_request_latency_seconds", METRIC_PREFIX),
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();
}
